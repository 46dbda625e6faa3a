//! Infrastructure layer: job runtime, row storage, artifacts, mail, config.

pub mod artifact;
pub mod config;
pub mod jobs;
pub mod mail;
pub mod repository;

pub use artifact::{ArtifactError, ArtifactStore, FsArtifactStore, StoredArtifact};
pub use config::{AiConfig, AppConfig, ConfigError};
pub use mail::{LoggingTransport, MailError, MailTransport, OutgoingMail, RecordingTransport};
pub use repository::{EntityStore, InMemoryEntityStore, Repository};
