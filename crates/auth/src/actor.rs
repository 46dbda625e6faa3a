use serde::{Deserialize, Serialize};

use ami_core::UserId;

use crate::Role;

/// An authenticated caller, as handed to services by the transport layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn customer(id: UserId) -> Self {
        Self::new(id, Role::CustomerUser)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
