use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ami_auth::{CredentialHash, Role, User};
use ami_core::{DomainError, ExpectedVersion};

use crate::error::ServiceResult;
use crate::services::email::EmailService;
use crate::stores::Stores;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_CUSTOMER_PASSWORD_LEN: usize = 8;
const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Completion of an invitation by the invitee.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSignup {
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub invitation_code: String,
    pub agree_to_terms: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequested {
    /// Always true so callers cannot probe which emails exist.
    pub accepted: bool,
}

fn check_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ))
        .into());
    }
    Ok(())
}

/// Invitees get the stricter policy: eight characters with an upper-case
/// letter, a lower-case letter, a digit and one of `@$!%*?&`.
fn check_customer_password(password: &str) -> ServiceResult<()> {
    let strong = password.chars().count() >= MIN_CUSTOMER_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    if !strong {
        return Err(DomainError::validation(
            "password must be at least 8 characters and contain upper case, lower case, a digit and a special character",
        )
        .into());
    }
    Ok(())
}

/// Account lifecycle around credentials and tokens.
///
/// Password hashing lives with the transport layer; every method that sets a
/// credential takes the hasher as a closure and only ever sees plaintext long
/// enough to validate it.
#[derive(Clone)]
pub struct AuthService {
    stores: Stores,
    email: EmailService,
}

impl AuthService {
    pub fn new(stores: Stores, email: EmailService) -> Self {
        Self { stores, email }
    }

    /// Self-registration. Admin accounts cannot be created this way. A failed
    /// verification mail enqueue is logged and does not fail the sign-up.
    pub fn sign_up(&self, input: SignUp, hash: impl FnOnce(&str) -> CredentialHash) -> ServiceResult<User> {
        check_password(&input.password)?;
        let role = input.role.unwrap_or_default();
        if role.is_admin() {
            return Err(DomainError::forbidden("admin accounts cannot self-register").into());
        }

        let user = User::register(
            &input.email,
            hash(&input.password),
            &input.first_name,
            &input.last_name,
            role,
            Utc::now(),
        )?;
        let user = self.stores.insert_user(user)?;
        info!(user_id = %user.id, %role, "user signed up");

        if let Some(token) = &user.email_verification_token {
            if let Err(e) = self.email.send_email_verification(&user.email, token.as_str()) {
                warn!(user_id = %user.id, error = %e, "failed to enqueue verification email");
            }
        }
        Ok(user)
    }

    /// Checks the credential with `verify` and records the login. Unknown
    /// email and wrong password fail identically.
    pub fn sign_in(&self, email: &str, verify: impl FnOnce(&CredentialHash) -> bool) -> ServiceResult<User> {
        let invalid = || DomainError::unauthorized("invalid credentials");
        let user = self.stores.user_by_email(email)?.ok_or_else(invalid)?;
        let matches = user.credential_hash.as_ref().is_some_and(verify);
        if !matches {
            debug!(user_id = %user.id, "credential check failed");
            return Err(invalid().into());
        }

        let now = Utc::now();
        let user = self
            .stores
            .users
            .modify(&user.id, ExpectedVersion::Any, &mut |u: &mut User| u.record_login(now))?
            .ok_or_else(invalid)?;
        info!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    pub fn find_by_verification_token(&self, token: &str) -> ServiceResult<Option<User>> {
        if token.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .stores
            .users
            .scan(&|u: &User| u.has_verification_token(token))?
            .into_iter()
            .next())
    }

    fn by_verification_token(&self, token: &str) -> ServiceResult<User> {
        self.find_by_verification_token(token)?
            .ok_or_else(|| DomainError::validation("Invalid verification token").into())
    }

    /// Marks the email verified. The token stays valid, so a repeated request
    /// with the same link succeeds too.
    pub fn verify_email(&self, token: &str) -> ServiceResult<User> {
        let user = self.by_verification_token(token)?;
        let now = Utc::now();
        let user = self
            .stores
            .users
            .modify(&user.id, ExpectedVersion::Any, &mut |u: &mut User| {
                u.verify_email(now);
                Ok(())
            })?
            .ok_or_else(|| DomainError::validation("Invalid verification token"))?;
        info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    /// Second verification step, after the client has shown the success state.
    pub fn clear_verification_token(&self, token: &str) -> ServiceResult<()> {
        let user = self.by_verification_token(token)?;
        let now = Utc::now();
        self.stores
            .users
            .modify(&user.id, ExpectedVersion::Any, &mut |u: &mut User| {
                u.clear_verification_token(now);
                Ok(())
            })?;
        debug!(user_id = %user.id, "verification token cleared");
        Ok(())
    }

    /// Issues a reset token and mails it. Unknown emails get the same answer.
    pub fn request_password_reset(&self, email: &str) -> ServiceResult<PasswordResetRequested> {
        let accepted = PasswordResetRequested { accepted: true };
        let Some(user) = self.stores.user_by_email(email)? else {
            debug!("password reset requested for unknown email");
            return Ok(accepted);
        };

        let now = Utc::now();
        let mut issued = None;
        self.stores
            .users
            .modify(&user.id, ExpectedVersion::Any, &mut |u: &mut User| {
                issued = Some(u.issue_password_reset(now));
                Ok(())
            })?;
        if let Some(token) = issued {
            if let Err(e) = self.email.send_password_reset(&user.email, token.as_str()) {
                warn!(user_id = %user.id, error = %e, "failed to enqueue password reset email");
            }
            info!(user_id = %user.id, "password reset issued");
        }
        Ok(accepted)
    }

    /// Unknown, expired and already used tokens all fail with the same error.
    pub fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        hash: impl FnOnce(&str) -> CredentialHash,
    ) -> ServiceResult<()> {
        check_password(new_password)?;
        let user = self
            .stores
            .users
            .scan(&|u: &User| u.has_reset_token(token))?
            .into_iter()
            .next()
            .ok_or_else(User::invalid_reset_token)?;

        let credential = hash(new_password);
        let now = Utc::now();
        self.stores
            .users
            .modify(&user.id, ExpectedVersion::Any, &mut |u: &mut User| {
                u.reset_password(token, credential.clone(), now)
            })?
            .ok_or_else(User::invalid_reset_token)?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Activates an invited account with the code from the invitation mail.
    pub fn complete_customer_signup(
        &self,
        input: CustomerSignup,
        hash: impl FnOnce(&str) -> CredentialHash,
    ) -> ServiceResult<User> {
        if !input.agree_to_terms {
            return Err(DomainError::validation("you must agree to the terms").into());
        }
        if input.password != input.confirm_password {
            return Err(DomainError::validation("passwords do not match").into());
        }
        check_customer_password(&input.password)?;

        let code = input.invitation_code.trim();
        let invited = self
            .find_by_verification_token(code)?
            .ok_or_else(|| DomainError::validation("Invalid invitation code"))?;
        if !invited.email.eq_ignore_ascii_case(input.email.trim()) {
            return Err(DomainError::validation("Invalid invitation code").into());
        }

        let credential = hash(&input.password);
        let now = Utc::now();
        let user = self
            .stores
            .users
            .modify(&invited.id, ExpectedVersion::Any, &mut |u: &mut User| {
                u.complete_signup(
                    credential.clone(),
                    &input.first_name,
                    &input.last_name,
                    input.title.clone(),
                    input.phone.clone(),
                    input.company.clone(),
                    input.source.clone(),
                    now,
                )
            })?
            .ok_or_else(|| DomainError::validation("Invalid invitation code"))?;
        info!(user_id = %user.id, "customer signup completed");
        Ok(user)
    }
}
