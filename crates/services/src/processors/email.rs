//! `email` queue: renders the transactional templates and hands them to the
//! mail transport. No fallback; a transport error fails the job.

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use tracing::info;

use ami_infra::jobs::{JobContext, JobError, JobRegistry};
use ami_infra::{AppConfig, MailTransport, OutgoingMail};

use crate::jobs::{InvitationMailJob, PasswordResetMailJob, VerificationMailJob, kind, queue};

pub const INVITATION_SUBJECT: &str = "Invitation to Join 4AMI Platform";
pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset Request - 4AMI Platform";
pub const VERIFICATION_SUBJECT: &str = "Verify Your Email - 4AMI Platform";

pub fn register(registry: &mut JobRegistry, transport: &Arc<dyn MailTransport>, config: &Arc<AppConfig>) {
    let mailer = Mailer {
        transport: transport.clone(),
        config: config.clone(),
    };
    let m = mailer.clone();
    registry.register(queue::EMAIL, kind::SEND_EMAIL, move |ctx| m.send_email(ctx));
    let m = mailer.clone();
    registry.register(queue::EMAIL, kind::SEND_INVITATION, move |ctx| m.send_invitation(ctx));
    let m = mailer.clone();
    registry.register(queue::EMAIL, kind::SEND_PASSWORD_RESET, move |ctx| m.send_password_reset(ctx));
    registry.register(queue::EMAIL, kind::SEND_EMAIL_VERIFICATION, move |ctx| {
        mailer.send_verification(ctx)
    });
}

fn escape(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len()), |mut out, c| {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
        out
    })
}

/// Shared layout: heading, paragraphs, a call-to-action button and the raw
/// link for clients that do not render it.
fn render(heading: &str, paragraphs: &[String], action: &str, colour: &str, url: &str, footer: &[&str]) -> String {
    let url = escape(url);
    let mut html = String::from(r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#);
    html.push_str(&format!("<h2>{heading}</h2>"));
    for p in paragraphs {
        html.push_str(&format!("<p>{p}</p>"));
    }
    html.push_str(&format!(
        r#"<a href="{url}" style="background-color: {colour}; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; display: inline-block;">{action}</a>"#
    ));
    html.push_str("<p>If the button doesn't work, copy and paste this link into your browser:</p>");
    html.push_str(&format!("<p>{url}</p>"));
    for line in footer {
        html.push_str(&format!("<p>{line}</p>"));
    }
    html.push_str("<p>Best regards,<br>The 4AMI Team</p></div>");
    html
}

pub fn invitation_mail(job: &InvitationMailJob, config: &AppConfig) -> OutgoingMail {
    let url = config.invitation_url(&job.invitation_token);
    let mut paragraphs = vec![
        format!("Hello {} {},", escape(&job.first_name), escape(&job.last_name)),
        format!("You have been invited to join the 4AMI Platform as a {}.", escape(&job.role)),
    ];
    if let Some(message) = job.custom_message.as_deref().filter(|m| !m.trim().is_empty()) {
        paragraphs.push(escape(message));
    }
    paragraphs.push("Click the link below to complete your registration:".to_string());
    OutgoingMail::html(
        &job.email,
        INVITATION_SUBJECT,
        render("Welcome to 4AMI Platform", &paragraphs, "Complete Registration", "#007bff", &url, &[]),
    )
}

pub fn password_reset_mail(job: &PasswordResetMailJob, config: &AppConfig) -> OutgoingMail {
    let url = config.reset_password_url(&job.reset_token);
    let paragraphs = [
        "You have requested to reset your password for your 4AMI Platform account.".to_string(),
        "Click the link below to reset your password:".to_string(),
    ];
    OutgoingMail::html(
        &job.email,
        PASSWORD_RESET_SUBJECT,
        render(
            "Password Reset Request",
            &paragraphs,
            "Reset Password",
            "#dc3545",
            &url,
            &[
                "This link will expire in 1 hour.",
                "If you didn't request this password reset, please ignore this email.",
            ],
        ),
    )
}

pub fn verification_mail(job: &VerificationMailJob, config: &AppConfig) -> OutgoingMail {
    let url = config.verification_url(&job.verification_token);
    let paragraphs = [
        "Thank you for registering with 4AMI Platform!".to_string(),
        "Please verify your email address by clicking the link below:".to_string(),
    ];
    OutgoingMail::html(
        &job.email,
        VERIFICATION_SUBJECT,
        render("Email Verification", &paragraphs, "Verify Email", "#28a745", &url, &[]),
    )
}

#[derive(Clone)]
struct Mailer {
    transport: Arc<dyn MailTransport>,
    config: Arc<AppConfig>,
}

impl Mailer {
    fn deliver(&self, ctx: &JobContext<'_>, mail: &OutgoingMail) -> Result<String, JobError> {
        let message_id = self.transport.send(mail).map_err(JobError::failed)?;
        info!(job_id = %ctx.job().id, to = %mail.to, subject = %mail.subject, %message_id, "email sent");
        Ok(message_id)
    }

    fn send_email(&self, ctx: &JobContext<'_>) -> Result<JsonValue, JobError> {
        let mail: OutgoingMail = ctx.payload()?;
        mail.validate().map_err(JobError::failed)?;
        self.deliver(ctx, &mail)?;
        Ok(json!({ "success": true, "to": mail.to, "subject": mail.subject }))
    }

    fn send_invitation(&self, ctx: &JobContext<'_>) -> Result<JsonValue, JobError> {
        let job: InvitationMailJob = ctx.payload()?;
        self.deliver(ctx, &invitation_mail(&job, &self.config))?;
        Ok(json!({ "success": true, "email": job.email, "role": job.role }))
    }

    fn send_password_reset(&self, ctx: &JobContext<'_>) -> Result<JsonValue, JobError> {
        let job: PasswordResetMailJob = ctx.payload()?;
        self.deliver(ctx, &password_reset_mail(&job, &self.config))?;
        Ok(json!({ "success": true, "email": job.email }))
    }

    fn send_verification(&self, ctx: &JobContext<'_>) -> Result<JsonValue, JobError> {
        let job: VerificationMailJob = ctx.payload()?;
        self.deliver(ctx, &verification_mail(&job, &self.config))?;
        Ok(json!({ "success": true, "email": job.email }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ami_infra::RecordingTransport;
    use ami_infra::jobs::{InMemoryJobStore, JobRuntime, JobStatus, RuntimeConfig};

    fn config() -> AppConfig {
        AppConfig {
            frontend_url: "https://app.example.com".to_string(),
            backend_url: "https://api.example.com".to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn invitation_links_to_customer_signup() {
        let job = InvitationMailJob {
            email: "new@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            role: "customer_user".into(),
            invitation_token: "A7X3D".into(),
            custom_message: Some("<b>hi</b>".into()),
        };
        let mail = invitation_mail(&job, &config());
        let html = mail.html.unwrap();
        assert_eq!(mail.subject, INVITATION_SUBJECT);
        assert!(html.contains("https://app.example.com/customer_signup?token=A7X3D"));
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains("as a customer_user"));
    }

    #[test]
    fn hostile_token_cannot_break_out_of_the_link() {
        let job = InvitationMailJob {
            email: "new@example.com".into(),
            first_name: "O'Brien".into(),
            last_name: "x".into(),
            role: "customer_user".into(),
            invitation_token: "x\"><script>alert(1)</script>".into(),
            custom_message: Some("it's <script>".into()),
        };
        let html = invitation_mail(&job, &config()).html.unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("token=x%22%3E%3Cscript%3Ealert%281%29%3C%2Fscript%3E\""));
        assert!(html.contains("O&#39;Brien"));
        assert!(html.contains("it&#39;s &lt;script&gt;"));
    }

    #[test]
    fn escape_covers_attribute_quotes() {
        assert_eq!(escape(r#"a"b'c&"#), "a&quot;b&#39;c&amp;");
    }

    #[test]
    fn verification_links_to_backend() {
        let job = VerificationMailJob {
            email: "a@example.com".into(),
            verification_token: "tok".into(),
        };
        let html = verification_mail(&job, &config()).html.unwrap();
        assert!(html.contains("https://api.example.com/api/v1/auth/verify-email/tok"));
    }

    fn runtime(transport: Arc<RecordingTransport>) -> JobRuntime {
        let transport: Arc<dyn MailTransport> = transport;
        let mut registry = JobRegistry::new();
        register(&mut registry, &transport, &Arc::new(config()));
        JobRuntime::new(InMemoryJobStore::arc(), registry, RuntimeConfig::default())
    }

    #[test]
    fn reset_mail_is_delivered() {
        let transport = Arc::new(RecordingTransport::new());
        let rt = runtime(transport.clone());
        let payload = PasswordResetMailJob {
            email: "a@example.com".into(),
            reset_token: "r1".into(),
        };
        let handle = rt.enqueue_json(queue::EMAIL, kind::SEND_PASSWORD_RESET, &payload).unwrap();
        rt.run_pending().unwrap();

        let job = rt.job(queue::EMAIL, handle.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap()["email"], "a@example.com");
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, PASSWORD_RESET_SUBJECT);
        assert!(sent[0].html.as_deref().unwrap().contains("reset-password?token=r1"));
    }

    #[test]
    fn transport_error_fails_the_job() {
        let rt = runtime(Arc::new(RecordingTransport::failing("smtp down")));
        let handle = rt
            .enqueue_json(
                queue::EMAIL,
                kind::SEND_EMAIL,
                &json!({ "to": "a@example.com", "subject": "Hi", "text": "body" }),
            )
            .unwrap();
        rt.run_pending().unwrap();

        let job = rt.job(queue::EMAIL, handle.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.failure_reason.unwrap().contains("smtp down"));
    }
}
