use serde::Serialize;
use thiserror::Error;

use ami_core::{DomainError, UserId};

use crate::{Actor, Role};

/// Visibility of one entity for one actor.
///
/// This is the single place role-based branching happens; repositories apply
/// it uniformly instead of each service re-deriving it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScope {
    /// Admin: every row, regardless of owner.
    Full,
    /// The actor owns the row.
    OwnerOnly,
    /// The row belongs to someone else.
    None,
}

impl AccessScope {
    pub fn permits(self) -> bool {
        !matches!(self, AccessScope::None)
    }
}

/// Decide the access scope of `actor` over a row owned by `owner`.
///
/// - No IO
/// - No panics
pub fn access_scope(actor: &Actor, owner: UserId) -> AccessScope {
    if actor.role.is_admin() {
        AccessScope::Full
    } else if actor.id == owner {
        AccessScope::OwnerOnly
    } else {
        AccessScope::None
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' may not {action}")]
    RoleNotAllowed { role: Role, action: &'static str },

    #[error("forbidden: you can only modify your own {kind}")]
    NotOwner { kind: &'static str },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::forbidden(value.to_string())
    }
}

/// Guard for mutations that were fetched without scope filtering.
pub fn require_owner(actor: &Actor, owner: UserId, kind: &'static str) -> Result<(), AuthzError> {
    if access_scope(actor, owner).permits() {
        Ok(())
    } else {
        Err(AuthzError::NotOwner { kind })
    }
}

/// Inviting, activating and deactivating users is limited to admins and
/// customer admins.
pub fn require_user_manager(actor: &Actor, action: &'static str) -> Result<(), AuthzError> {
    match actor.role {
        Role::Admin | Role::CustomerAdmin => Ok(()),
        role => Err(AuthzError::RoleNotAllowed { role, action }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn admin_sees_everything() {
        let admin = Actor::admin(UserId::new());
        assert_eq!(access_scope(&admin, UserId::new()), AccessScope::Full);
        assert_eq!(access_scope(&admin, admin.id), AccessScope::Full);
    }

    #[test]
    fn customer_admin_is_not_an_admin_for_visibility() {
        let actor = Actor::new(UserId::new(), Role::CustomerAdmin);
        assert_eq!(access_scope(&actor, UserId::new()), AccessScope::None);
        assert_eq!(access_scope(&actor, actor.id), AccessScope::OwnerOnly);
    }

    #[test]
    fn user_management_requires_manager_role() {
        assert!(require_user_manager(&Actor::admin(UserId::new()), "invite users").is_ok());
        assert!(
            require_user_manager(&Actor::new(UserId::new(), Role::CustomerAdmin), "invite users")
                .is_ok()
        );
        let err = require_user_manager(&Actor::customer(UserId::new()), "invite users").unwrap_err();
        assert!(DomainError::from(err).is_forbidden());
    }

    fn non_admin_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::CustomerAdmin), Just(Role::CustomerUser)]
    }

    proptest! {
        /// Property: a non-admin never gets scope over another user's row.
        #[test]
        fn non_admin_never_sees_foreign_rows(a in any::<u128>(), b in any::<u128>(), role in non_admin_role()) {
            prop_assume!(a != b);
            let actor = Actor::new(UserId::from_uuid(uuid::Uuid::from_u128(a)), role);
            let owner = UserId::from_uuid(uuid::Uuid::from_u128(b));
            prop_assert_eq!(access_scope(&actor, owner), AccessScope::None);
            prop_assert!(require_owner(&actor, owner, "assets").is_err());
        }
    }
}
