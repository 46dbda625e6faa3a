//! `ami-core`: domain foundation building blocks.
//!
//! Identifiers, the domain error model, and the small set of traits the
//! repository layer relies on (identity, ownership, row versioning).

pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod version;

pub use entity::{Entity, Owned};
pub use error::{DomainError, DomainResult};
pub use id::{AssetId, ProjectId, ReportId, ResidualFormId, UserId};
pub use page::{Page, PageRequest};
pub use version::{ExpectedVersion, Versioned};
