#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use ami_ai::{Scorer, UnconfiguredScorer};
use ami_assets::{Asset, NewAsset};
use ami_auth::{Actor, CredentialHash, Role, User};
use ami_infra::jobs::{InMemoryJobStore, JobStore, RuntimeConfig};
use ami_infra::{AppConfig, FsArtifactStore, MailTransport, RecordingTransport};
use ami_projects::{NewProject, Project};
use ami_services::{App, Components, Stores};

pub struct Harness {
    pub app: App,
    pub mail: Arc<RecordingTransport>,
    pub uploads: TempDir,
}

pub fn harness() -> Harness {
    configured_harness(|_, _| {})
}

pub fn harness_with_scorer(scorer: Arc<dyn Scorer>) -> Harness {
    configured_harness(|_, components| components.scorer = scorer)
}

pub fn harness_with_job_store(job_store: Arc<dyn JobStore>) -> Harness {
    configured_harness(|_, components| components.job_store = job_store)
}

/// Test defaults (temp uploads, recording mail, no remote scorer) that
/// `customize` may adjust before the app is built.
pub fn configured_harness(customize: impl FnOnce(&mut AppConfig, &mut Components)) -> Harness {
    let uploads = tempfile::tempdir().expect("tempdir");
    let mail = Arc::new(RecordingTransport::new());
    let mut config = AppConfig {
        frontend_url: "https://app.example.com".to_string(),
        backend_url: "https://api.example.com".to_string(),
        uploads_dir: uploads.path().to_path_buf(),
        jobs: RuntimeConfig::default(),
        ..AppConfig::default()
    };
    let transport: Arc<dyn MailTransport> = mail.clone();
    let mut components = Components {
        stores: Stores::in_memory(),
        job_store: InMemoryJobStore::arc(),
        artifacts: Arc::new(FsArtifactStore::new(uploads.path())),
        mail: transport,
        scorer: Arc::new(UnconfiguredScorer),
    };
    customize(&mut config, &mut components);
    Harness {
        app: App::build(config, components),
        mail,
        uploads,
    }
}

pub fn hash(password: &str) -> CredentialHash {
    CredentialHash::new(format!("hashed:{password}"))
}

pub fn verify(password: &str) -> impl FnOnce(&CredentialHash) -> bool + '_ {
    move |stored| stored.expose_secret() == format!("hashed:{password}")
}

impl Harness {
    pub fn user(&self, email: &str, role: Role) -> Actor {
        let user = User::register(email, hash("secret1"), "Test", "User", role, Utc::now()).expect("valid user");
        let user = self.app.stores.insert_user(user).expect("unique email");
        Actor::new(user.id, user.role)
    }

    pub fn project(&self, actor: &Actor, name: &str) -> Project {
        self.app
            .projects
            .create(
                actor,
                NewProject {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
            .expect("project created")
    }

    pub fn asset(&self, actor: &Actor, name: &str, project: Option<&Project>) -> Asset {
        self.app
            .assets
            .create(
                actor,
                NewAsset {
                    name: name.to_string(),
                    asset_type: "machine".to_string(),
                    value: Some(10_000.0),
                    residual_value: Some(6_000.0),
                    project_id: project.map(|p| p.id),
                    ..Default::default()
                },
            )
            .expect("asset created")
    }

    pub fn drain(&self) -> usize {
        self.app.runtime.run_pending().expect("job store available")
    }
}
