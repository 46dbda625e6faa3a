//! Application wiring: stores, then processors, then the job runtime, then
//! the services that enqueue onto it.

use std::sync::Arc;

use tracing::{info, warn};

use ami_ai::{Analyzer, HttpScorer, Scorer, UnconfiguredScorer};
use ami_infra::jobs::{InMemoryJobStore, JobRuntime, JobStore};
use ami_infra::{AppConfig, ArtifactStore, FsArtifactStore, LoggingTransport, MailTransport};
use ami_reports::BuilderRegistry;

use crate::processors::{self, ProcessorDeps};
use crate::services::{
    AiService, AssetsService, AuthService, EmailService, ProjectsService, ReportsService, UsersService,
};
use crate::stores::Stores;

/// Replaceable collaborators. Tests swap in temp directories, recording
/// transports and canned scorers.
#[derive(Clone)]
pub struct Components {
    pub stores: Stores,
    pub job_store: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub mail: Arc<dyn MailTransport>,
    pub scorer: Arc<dyn Scorer>,
}

impl Components {
    /// In-memory rows and jobs, artifacts under `uploads_dir` and logged mail.
    /// Analyses go to the configured remote scorer, or straight to the
    /// heuristics when none is configured.
    pub fn from_config(config: &AppConfig) -> Self {
        if config.smtp_host.is_some() {
            warn!("SMTP delivery is not available in this build; mail is logged only");
        }
        Self {
            stores: Stores::in_memory(),
            job_store: InMemoryJobStore::arc(),
            artifacts: Arc::new(FsArtifactStore::new(config.uploads_dir.clone())),
            mail: Arc::new(LoggingTransport::new(config.mail_from.clone())),
            scorer: scorer_from_config(config),
        }
    }
}

fn scorer_from_config(config: &AppConfig) -> Arc<dyn Scorer> {
    let Some(ai) = &config.ai else {
        return Arc::new(UnconfiguredScorer);
    };
    match HttpScorer::new(ai.url.clone(), &ai.api_key, ai.timeout) {
        Ok(scorer) => {
            info!(url = %ai.url, timeout_secs = ai.timeout.as_secs(), "remote AI scorer enabled");
            Arc::new(scorer)
        }
        Err(e) => {
            warn!(error = %e, "remote AI scorer unavailable; analyses use heuristics");
            Arc::new(UnconfiguredScorer)
        }
    }
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub runtime: Arc<JobRuntime>,
    pub assets: AssetsService,
    pub projects: ProjectsService,
    pub reports: ReportsService,
    pub users: UsersService,
    pub auth: AuthService,
    pub email: EmailService,
    pub ai: AiService,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn build(config: AppConfig, components: Components) -> Self {
        let config = Arc::new(config);
        let Components {
            stores,
            job_store,
            artifacts,
            mail,
            scorer,
        } = components;

        let registry = processors::registry(&ProcessorDeps {
            stores: stores.clone(),
            analyzer: Analyzer::new(scorer),
            artifacts: artifacts.clone(),
            mail,
            builders: BuilderRegistry::default(),
            config: config.clone(),
        });
        let runtime = Arc::new(JobRuntime::new(job_store, registry, config.jobs.clone()));

        let email = EmailService::new(runtime.clone());
        Self {
            assets: AssetsService::new(stores.clone(), runtime.clone()),
            projects: ProjectsService::new(stores.clone()),
            reports: ReportsService::new(stores.clone(), runtime.clone(), artifacts),
            users: UsersService::new(stores.clone(), email.clone()),
            auth: AuthService::new(stores.clone(), email.clone()),
            ai: AiService::new(stores.clone(), runtime.clone()),
            email,
            stores,
            runtime,
            config,
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let components = Components::from_config(&config);
        Self::build(config, components)
    }

    /// Starts the worker pools.
    pub fn start(&self) -> std::io::Result<()> {
        self.runtime.start()?;
        info!(uploads_dir = %self.config.uploads_dir.display(), "workers started");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.runtime.shutdown();
        info!("workers stopped");
    }
}
