use core::str::FromStr;

use serde::{Deserialize, Serialize};

use ami_core::DomainError;

/// Role identifier used for visibility and user-management decisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator: bypasses every ownership filter.
    Admin,
    /// Customer-side administrator: may invite and (de)activate users.
    CustomerAdmin,
    /// Regular customer user.
    #[default]
    CustomerUser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::CustomerAdmin, Role::CustomerUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CustomerAdmin => "customer_admin",
            Role::CustomerUser => "customer_user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "customer_admin" => Ok(Role::CustomerAdmin),
            "customer_user" => Ok(Role::CustomerUser),
            other => Err(DomainError::validation(format!(
                "role must be one of admin, customer_admin, customer_user (got '{other}')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Customer_User".parse::<Role>().unwrap(), Role::CustomerUser);
        assert!("owner".parse::<Role>().is_err());
    }
}
