use std::sync::Arc;

use ami_core::DomainError;
use ami_infra::OutgoingMail;
use ami_infra::jobs::JobRuntime;

use crate::error::ServiceResult;
use crate::jobs::{
    InvitationMailJob, JobAccepted, PasswordResetMailJob, VerificationMailJob, kind, queue,
};

/// Enqueues transactional mail; delivery happens on the `email` queue.
#[derive(Clone)]
pub struct EmailService {
    runtime: Arc<JobRuntime>,
}

impl EmailService {
    pub fn new(runtime: Arc<JobRuntime>) -> Self {
        Self { runtime }
    }

    pub fn send_email(&self, mail: OutgoingMail) -> ServiceResult<JobAccepted> {
        mail.validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;
        let handle = self.runtime.enqueue_json(queue::EMAIL, kind::SEND_EMAIL, &mail)?;
        Ok(JobAccepted::new(handle, "Email queued for sending"))
    }

    pub fn send_invitation(&self, invitation: InvitationMailJob) -> ServiceResult<JobAccepted> {
        let handle = self
            .runtime
            .enqueue_json(queue::EMAIL, kind::SEND_INVITATION, &invitation)?;
        Ok(JobAccepted::new(handle, "Invitation email queued for sending"))
    }

    pub fn send_password_reset(&self, email: &str, reset_token: &str) -> ServiceResult<JobAccepted> {
        let payload = PasswordResetMailJob {
            email: email.to_string(),
            reset_token: reset_token.to_string(),
        };
        let handle = self
            .runtime
            .enqueue_json(queue::EMAIL, kind::SEND_PASSWORD_RESET, &payload)?;
        Ok(JobAccepted::new(handle, "Password reset email queued for sending"))
    }

    pub fn send_email_verification(&self, email: &str, verification_token: &str) -> ServiceResult<JobAccepted> {
        let payload = VerificationMailJob {
            email: email.to_string(),
            verification_token: verification_token.to_string(),
        };
        let handle = self
            .runtime
            .enqueue_json(queue::EMAIL, kind::SEND_EMAIL_VERIFICATION, &payload)?;
        Ok(JobAccepted::new(handle, "Email verification queued for sending"))
    }
}
