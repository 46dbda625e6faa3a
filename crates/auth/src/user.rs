//! User account entity and its token lifecycle.
//!
//! Email verification is deliberately two-step: [`User::verify_email`] marks
//! the address verified but keeps the token, so a repeated verification
//! request for the same link still resolves to the same user. The token is
//! only dropped by an explicit [`User::clear_verification_token`] call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use ami_core::{DomainError, DomainResult, Entity, UserId, Versioned};

use crate::{CredentialHash, Role, Token};

/// Lifetime of a password-reset token.
pub fn password_reset_ttl() -> Duration {
    Duration::hours(1)
}

const INVALID_RESET_TOKEN: &str = "invalid or expired reset token";

/// User account.
///
/// # Invariants
/// - `email` is unique across all users (enforced by the users service).
/// - A password-reset token is only honoured before `password_reset_expires`.
/// - Consuming a reset token clears both the token and its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: Option<CredentialHash>,
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<Token>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<Token>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Entity for User {
    type Id = UserId;
    const KIND: &'static str = "user";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Versioned for User {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

fn validate_email(email: &str) -> DomainResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid email address '{email}'")));
    }
    Ok(email.to_string())
}

fn validate_name(field: &str, value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

impl User {
    /// Self-registered account: active immediately, email unverified.
    pub fn register(
        email: &str,
        credential_hash: CredentialHash,
        first_name: &str,
        last_name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: UserId::new(),
            email: validate_email(email)?,
            credential_hash: Some(credential_hash),
            first_name: validate_name("first name", first_name)?,
            last_name: validate_name("last name", last_name)?,
            title: None,
            phone: None,
            company: None,
            source: None,
            role,
            is_active: true,
            is_email_verified: false,
            email_verification_token: Some(Token::generate()),
            password_reset_token: None,
            password_reset_expires: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Invited account: inactive until the invitee completes signup with the
    /// invitation code, which doubles as the verification token.
    #[allow(clippy::too_many_arguments)]
    pub fn invited(
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
        company: Option<String>,
        source: Option<String>,
        invitation_code: Token,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut user = Self::register(
            email,
            CredentialHash::new(String::new()),
            first_name,
            last_name,
            role,
            now,
        )?;
        user.credential_hash = None;
        user.company = company;
        user.source = source;
        user.is_active = false;
        user.email_verification_token = Some(invitation_code);
        Ok(user)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn has_verification_token(&self, candidate: &str) -> bool {
        self.email_verification_token
            .as_ref()
            .is_some_and(|t| t.matches(candidate))
    }

    pub fn has_reset_token(&self, candidate: &str) -> bool {
        self.password_reset_token
            .as_ref()
            .is_some_and(|t| t.matches(candidate))
    }

    /// Mark the email verified. The token is kept (see module docs).
    pub fn verify_email(&mut self, now: DateTime<Utc>) {
        self.is_email_verified = true;
        self.touch(now);
    }

    /// Second step of verification: drop the token once the client confirmed it
    /// displayed the success state.
    pub fn clear_verification_token(&mut self, now: DateTime<Utc>) {
        self.email_verification_token = None;
        self.touch(now);
    }

    /// Issue a fresh reset token, replacing any previous one.
    pub fn issue_password_reset(&mut self, now: DateTime<Utc>) -> Token {
        let token = Token::generate();
        self.password_reset_token = Some(token.clone());
        self.password_reset_expires = Some(now + password_reset_ttl());
        self.touch(now);
        token
    }

    /// The one error returned for unknown, expired and already-consumed reset
    /// tokens alike.
    pub fn invalid_reset_token() -> DomainError {
        DomainError::validation(INVALID_RESET_TOKEN)
    }

    /// Consume a reset token and replace the credential.
    pub fn reset_password(
        &mut self,
        candidate: &str,
        credential_hash: CredentialHash,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let token_ok = self.has_reset_token(candidate);
        let unexpired = self.password_reset_expires.is_some_and(|exp| now < exp);
        if !(token_ok && unexpired) {
            return Err(Self::invalid_reset_token());
        }
        self.credential_hash = Some(credential_hash);
        self.password_reset_token = None;
        self.password_reset_expires = None;
        self.touch(now);
        Ok(())
    }

    /// Finish an invitation: set the credential and profile, activate.
    #[allow(clippy::too_many_arguments)]
    pub fn complete_signup(
        &mut self,
        credential_hash: CredentialHash,
        first_name: &str,
        last_name: &str,
        title: Option<String>,
        phone: Option<String>,
        company: Option<String>,
        source: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.credential_hash.is_some() {
            return Err(DomainError::conflict("signup already completed"));
        }
        self.first_name = validate_name("first name", first_name)?;
        self.last_name = validate_name("last name", last_name)?;
        self.title = title;
        self.phone = phone;
        if company.is_some() {
            self.company = company;
        }
        if source.is_some() {
            self.source = source;
        }
        self.credential_hash = Some(credential_hash);
        self.is_active = true;
        self.is_email_verified = true;
        self.touch(now);
        Ok(())
    }

    /// Sign-in bookkeeping; inactive accounts are rejected.
    pub fn record_login(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::unauthorized("account is deactivated"));
        }
        self.last_login_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.touch(now);
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.touch(now);
    }
}
