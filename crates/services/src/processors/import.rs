//! `asset-import` queue: best-effort CSV import with a per-row tally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use csv::{ReaderBuilder, Trim};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use ami_assets::{Asset, DuplicatePolicy, ImportRow, ImportTally};
use ami_core::{DomainResult, ProjectId, UserId};
use ami_infra::ArtifactStore;
use ami_infra::jobs::{JobContext, JobError, JobRegistry};

use crate::jobs::{BulkImportJob, kind, queue};
use crate::stores::Stores;

/// Failure that stops an import before any row is read.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read upload {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub fn register(registry: &mut JobRegistry, stores: &Stores, artifacts: &Arc<dyn ArtifactStore>) {
    let (stores, artifacts) = (stores.clone(), artifacts.clone());
    registry.register(queue::ASSET_IMPORT, kind::BULK_IMPORT, move |ctx| {
        bulk_import(ctx, &stores, artifacts.as_ref())
    });
}

fn bulk_import(ctx: &JobContext<'_>, stores: &Stores, artifacts: &dyn ArtifactStore) -> Result<JsonValue, JobError> {
    let job: BulkImportJob = ctx.payload()?;
    let outcome = import_file(ctx, stores, &job);

    // The upload goes whatever the outcome.
    if let Err(e) = artifacts.remove(&job.file_path) {
        warn!(path = %job.file_path.display(), error = %e, "failed to delete import upload");
    }

    let tally = outcome.map_err(JobError::failed)?;
    info!(
        job_id = %ctx.job().id,
        processed = tally.processed,
        skipped = tally.skipped,
        errors = tally.errors,
        total = tally.total,
        "bulk import finished"
    );
    Ok(serde_json::to_value(tally)?)
}

fn import_file(ctx: &JobContext<'_>, stores: &Stores, job: &BulkImportJob) -> Result<ImportTally, ImportError> {
    let mut reader = open(&job.file_path)?;
    ctx.progress(10);
    let importer = RowImporter {
        stores,
        project_id: job.project_id,
        user_id: job.user_id,
        policy: job.policy,
    };

    let mut tally = ImportTally::default();
    for (line, record) in reader.deserialize::<HashMap<String, String>>().enumerate() {
        let result = record
            .map_err(|e| ami_core::DomainError::validation(e.to_string()))
            .and_then(|r| importer.import(&r));
        match result {
            Ok(RowOutcome::Created | RowOutcome::Updated) => tally.record_processed(),
            Ok(RowOutcome::Skipped) => tally.record_skipped(),
            Err(e) => {
                debug!(row = line + 1, error = %e, "import row rejected");
                tally.record_error();
            }
        }
    }
    Ok(tally)
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, ImportError> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ImportError::Open {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Created,
    Updated,
    Skipped,
}

struct RowImporter<'a> {
    stores: &'a Stores,
    project_id: Option<ProjectId>,
    user_id: UserId,
    policy: DuplicatePolicy,
}

impl RowImporter<'_> {
    /// Existing asset of the importer with the same (name, type).
    fn existing(&self, row: &ImportRow) -> DomainResult<Option<Asset>> {
        Ok(self
            .stores
            .assets
            .scan(&|a: &Asset| a.created_by == self.user_id && a.matches_key(&row.name, &row.asset_type))?
            .into_iter()
            .next())
    }

    fn import(&self, record: &HashMap<String, String>) -> DomainResult<RowOutcome> {
        let row = ImportRow::parse(record)?;
        let now = Utc::now();

        match (self.policy, self.existing(&row)?) {
            (DuplicatePolicy::Skip, Some(_)) => Ok(RowOutcome::Skipped),
            (DuplicatePolicy::UpdateExisting, Some(existing)) => {
                let mut row = Some(row);
                self.stores.assets.update_unscoped(&existing.id, |asset| {
                    if let Some(row) = row.take() {
                        row.apply_to(asset, now);
                    }
                    Ok(())
                })?;
                Ok(RowOutcome::Updated)
            }
            _ => {
                let asset = row.into_asset(self.project_id, self.user_id, now)?;
                self.stores.assets.insert(asset)?;
                Ok(RowOutcome::Created)
            }
        }
    }
}
