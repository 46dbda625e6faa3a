use std::sync::{Arc, Mutex};

use ami_assets::{Asset, ResidualForm};
use ami_auth::User;
use ami_core::{DomainError, DomainResult};
use ami_infra::{EntityStore, InMemoryEntityStore, Repository};
use ami_projects::Project;
use ami_reports::Report;

/// Every entity store the services and processors share.
#[derive(Clone)]
pub struct Stores {
    /// Users are not owner-scoped; role policy is applied by the users service.
    pub users: Arc<dyn EntityStore<User>>,
    pub assets: Repository<Asset>,
    pub projects: Repository<Project>,
    pub reports: Repository<Report>,
    pub residual_forms: Repository<ResidualForm>,
    registration: Arc<Mutex<()>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: InMemoryEntityStore::<User>::arc(),
            assets: Repository::new(InMemoryEntityStore::<Asset>::arc()),
            projects: Repository::new(InMemoryEntityStore::<Project>::arc()),
            reports: Repository::new(InMemoryEntityStore::<Report>::arc()),
            residual_forms: Repository::new(InMemoryEntityStore::<ResidualForm>::arc()),
            registration: Arc::new(Mutex::new(())),
        }
    }

    pub fn user_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .users
            .scan(&|u: &User| u.email.eq_ignore_ascii_case(email))?
            .into_iter()
            .next())
    }

    /// Insert a user unless the email is already registered.
    pub fn insert_user(&self, user: User) -> DomainResult<User> {
        let _guard = self
            .registration
            .lock()
            .map_err(|_| DomainError::invariant("registration lock poisoned"))?;
        if self.user_by_email(&user.email)?.is_some() {
            return Err(DomainError::conflict("User with this email already exists"));
        }
        self.users.insert(user)
    }
}
