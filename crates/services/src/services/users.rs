use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ami_auth::{Actor, CredentialHash, Role, Token, User, access_scope, require_user_manager};
use ami_core::{DomainError, ExpectedVersion, Page, PageRequest, UserId};

use crate::error::ServiceResult;
use crate::jobs::InvitationMailJob;
use crate::services::email::EmailService;
use crate::stores::Stores;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Code generated by the inviting client; a random one is used when absent.
    /// Letters, digits and `-` only.
    pub invitation_code: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub custom_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: usize,
    pub active_users: usize,
    pub pending_users: usize,
    pub users_by_role: BTreeMap<String, usize>,
}

impl UserStats {
    pub fn collect<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        users.into_iter().fold(Self::default(), |mut s, u| {
            s.total_users += 1;
            if u.is_active {
                s.active_users += 1;
            } else {
                s.pending_users += 1;
            }
            *s.users_by_role.entry(u.role.as_str().to_string()).or_default() += 1;
            s
        })
    }
}

const MAX_INVITATION_CODE_LEN: usize = 64;

/// Client-chosen codes travel in links and mail bodies, so only URL-safe
/// characters are accepted.
fn invitation_code(code: &str) -> Result<&str, DomainError> {
    let valid = code.len() <= MAX_INVITATION_CODE_LEN
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(code)
    } else {
        Err(DomainError::validation(format!(
            "invitation code may only contain letters, digits and '-' (at most {MAX_INVITATION_CODE_LEN})"
        )))
    }
}

#[derive(Clone)]
pub struct UsersService {
    stores: Stores,
    email: EmailService,
}

impl UsersService {
    pub fn new(stores: Stores, email: EmailService) -> Self {
        Self { stores, email }
    }

    fn load(&self, id: UserId) -> ServiceResult<User> {
        self.stores
            .users
            .get(&id)?
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    /// Admins see every account; everyone else only their own.
    pub fn find(&self, actor: &Actor, id: UserId) -> ServiceResult<User> {
        match self.stores.users.get(&id)? {
            Some(user) if access_scope(actor, user.id).permits() => Ok(user),
            _ => Err(DomainError::not_found("user").into()),
        }
    }

    pub fn list(&self, actor: &Actor, page: PageRequest) -> ServiceResult<Page<User>> {
        let mut users = self
            .stores
            .users
            .scan(&|u: &User| access_scope(actor, u.id).permits())?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(Page::from_sorted(users, page))
    }

    /// Creates an inactive account and mails the invitation. A mail queue
    /// failure is logged and does not undo the invitation.
    pub fn invite(&self, actor: &Actor, input: InviteUser) -> ServiceResult<User> {
        require_user_manager(actor, "invite users")?;
        if input.role.is_admin() && !actor.is_admin() {
            return Err(DomainError::forbidden("only admins may invite admins").into());
        }

        let code = match input.invitation_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Token::from_string(invitation_code(code)?),
            _ => Token::generate(),
        };
        let user = User::invited(
            &input.email,
            &input.first_name,
            &input.last_name,
            input.role,
            input.company,
            input.source,
            code,
            Utc::now(),
        )?;
        let user = self.stores.insert_user(user)?;
        info!(user_id = %user.id, role = %user.role, invited_by = %actor.id, "user invited");

        let invitation = InvitationMailJob {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.as_str().to_string(),
            invitation_token: user
                .email_verification_token
                .as_ref()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            custom_message: input.custom_message,
        };
        if let Err(e) = self.email.send_invitation(invitation) {
            warn!(user_id = %user.id, error = %e, "failed to enqueue invitation email");
        }
        Ok(user)
    }

    pub fn activate(&self, actor: &Actor, id: UserId) -> ServiceResult<User> {
        self.set_active(actor, id, true)
    }

    pub fn deactivate(&self, actor: &Actor, id: UserId) -> ServiceResult<User> {
        self.set_active(actor, id, false)
    }

    fn set_active(&self, actor: &Actor, id: UserId, active: bool) -> ServiceResult<User> {
        require_user_manager(actor, if active { "activate users" } else { "deactivate users" })?;
        let target = self.load(id)?;
        if target.role.is_admin() && !actor.is_admin() {
            return Err(DomainError::forbidden("only admins may change admin accounts").into());
        }

        let now = Utc::now();
        let user = self
            .stores
            .users
            .modify(&id, ExpectedVersion::Any, &mut |u: &mut User| {
                if active {
                    u.activate(now);
                } else {
                    u.deactivate(now);
                }
                Ok(())
            })?
            .ok_or_else(|| DomainError::not_found("user"))?;
        info!(user_id = %id, active, by = %actor.id, "user activation changed");
        Ok(user)
    }

    pub fn stats(&self, actor: &Actor) -> ServiceResult<UserStats> {
        require_user_manager(actor, "view user statistics")?;
        let users = self
            .stores
            .users
            .scan(&|u: &User| access_scope(actor, u.id).permits())?;
        Ok(UserStats::collect(&users))
    }

    /// Creates the bootstrap admin unless an account with that email exists.
    /// Returns `None` when nothing was created.
    pub fn seed_admin(
        &self,
        email: &str,
        credential_hash: CredentialHash,
        first_name: &str,
        last_name: &str,
    ) -> ServiceResult<Option<User>> {
        if self.stores.user_by_email(email)?.is_some() {
            info!(email, "admin already seeded");
            return Ok(None);
        }
        let now = Utc::now();
        let mut admin = User::register(email, credential_hash, first_name, last_name, Role::Admin, now)?;
        admin.verify_email(now);
        admin.clear_verification_token(now);
        match self.stores.insert_user(admin) {
            Ok(user) => {
                info!(user_id = %user.id, "admin user seeded");
                Ok(Some(user))
            }
            Err(DomainError::Conflict(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
