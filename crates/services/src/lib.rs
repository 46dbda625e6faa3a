//! `ami-services`
//!
//! Domain services for the request path and the background processors that
//! finish their work, wired together by [`App`].
//!
//! - Services validate, persist and enqueue; they never wait on a job.
//! - Processors run on the job runtime's worker pools, one module per queue.
//! - Failures inside a job are recorded on the job (and on the report for
//!   report generation) and are only observable by polling.

pub mod app;
pub mod error;
pub mod jobs;
pub mod processors;
pub mod services;
pub mod stores;

pub use app::{App, Components};
pub use error::{ServiceError, ServiceResult};
pub use jobs::JobAccepted;
pub use stores::Stores;
