//! Job handlers, one module per queue.

pub mod ai;
pub mod email;
pub mod import;
pub mod report;

use std::sync::Arc;

use ami_ai::Analyzer;
use ami_infra::jobs::JobRegistry;
use ami_infra::{AppConfig, ArtifactStore, MailTransport};
use ami_reports::BuilderRegistry;

use crate::stores::Stores;

/// What the handlers need beyond the job payload.
#[derive(Clone)]
pub struct ProcessorDeps {
    pub stores: Stores,
    pub analyzer: Analyzer,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub mail: Arc<dyn MailTransport>,
    pub builders: BuilderRegistry,
    pub config: Arc<AppConfig>,
}

/// Registry with a handler for every job type on every queue.
pub fn registry(deps: &ProcessorDeps) -> JobRegistry {
    let mut registry = JobRegistry::new();
    ai::register(&mut registry, &deps.stores, &deps.analyzer);
    import::register(&mut registry, &deps.stores, &deps.artifacts);
    report::register(&mut registry, &deps.stores, &deps.artifacts, &deps.builders);
    email::register(&mut registry, &deps.mail, &deps.config);
    registry
}
