use thiserror::Error;

use ami_core::DomainError;
use ami_infra::jobs::JobStoreError;

/// Synchronous failure of a service call.
///
/// Background failures never surface here; they are recorded on the job (and
/// on the report, for report generation) and observed by polling.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The job could not be enqueued.
    #[error("job queue unavailable: {0}")]
    Queue(#[from] JobStoreError),
}

impl From<ami_auth::AuthzError> for ServiceError {
    fn from(value: ami_auth::AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Queue(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.domain().is_some_and(DomainError::is_not_found)
    }

    pub fn is_forbidden(&self) -> bool {
        self.domain().is_some_and(DomainError::is_forbidden)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Conflict(_)))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Validation(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
