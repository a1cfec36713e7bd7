use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use marquee_core::models::MediaKind;
use marquee_core::AppError;
use marquee_db::MediaRepositoryTrait;
use marquee_storage::Storage;
use serde::Serialize;
use tokio::time::interval;

use crate::projects::ProjectService;

/// What one reconciliation pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned: usize,
    /// Storage keys of removed orphan files.
    pub removed: Vec<String>,
    /// Orphans younger than the grace period, left for a later pass.
    pub kept_recent: usize,
    pub failed: usize,
}

/// Repairs the managed upload tree after partial failures: files that no
/// registry row points at are removed once they are older than the grace
/// period. Each pass also reports dangling project references.
#[derive(Clone)]
pub struct CleanupService {
    media: Arc<dyn MediaRepositoryTrait>,
    storage: Arc<dyn Storage>,
    projects: ProjectService,
    grace_period: Duration,
    run_interval: Duration,
}

impl CleanupService {
    pub fn new(
        media: Arc<dyn MediaRepositoryTrait>,
        storage: Arc<dyn Storage>,
        projects: ProjectService,
        grace_period: Duration,
        run_interval: Duration,
    ) -> Self {
        Self {
            media,
            storage,
            projects,
            grace_period,
            run_interval,
        }
    }

    /// Start the background reconciliation loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.run_interval);

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled upload tree reconciliation");

                if let Err(e) = self.run_once().await {
                    tracing::error!(error = %e, "Cleanup task failed");
                }
            }
        })
    }

    /// One full pass: orphan files, then the dangling reference audit.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "reconcile"))]
    pub async fn run_once(&self) -> Result<ReconcileReport, AppError> {
        let report = self.reconcile_orphan_files().await?;

        let dangling = match self.projects.dangling_references().await {
            Ok(refs) => refs.len(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to audit project media references");
                0
            }
        };

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed.len(),
            kept_recent = report.kept_recent,
            failed = report.failed,
            dangling,
            "Cleanup completed"
        );

        Ok(report)
    }

    /// Remove files in the managed tree that no registry row knows about.
    /// Safe to repeat.
    pub async fn reconcile_orphan_files(&self) -> Result<ReconcileReport, AppError> {
        let mut report = ReconcileReport::default();
        let now = SystemTime::now();

        for kind in MediaKind::ALL {
            self.reconcile_kind(kind, now, &mut report).await?;
        }

        Ok(report)
    }

    #[tracing::instrument(skip(self, now, report), fields(cleanup.media_type = %kind))]
    async fn reconcile_kind(
        &self,
        kind: MediaKind,
        now: SystemTime,
        report: &mut ReconcileReport,
    ) -> Result<(), AppError> {
        let objects = self.storage.list(kind).await?;
        report.scanned += objects.len();
        if objects.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = objects.iter().map(|o| o.stored_name.clone()).collect();
        let known: HashSet<String> = self.media.known_stored_names(kind, &names).await?;

        for object in objects {
            if known.contains(&object.stored_name) {
                continue;
            }

            let age = now.duration_since(object.modified).unwrap_or_default();
            if age < self.grace_period {
                report.kept_recent += 1;
                continue;
            }

            match self.storage.delete(&object.key).await {
                Ok(()) => {
                    tracing::info!(storage_key = %object.key, "Removed orphan upload");
                    report.removed.push(object.key);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        storage_key = %object.key,
                        "Failed to remove orphan upload"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(())
    }
}
