//! Sync engine: diff collected artifacts against the remote snapshot and
//! upsert whatever changed.
//!
//! A run has two phases and no others:
//!   - **Fetched**: the remote id→content map is obtained with a single call.
//!     Failing here is terminal; nothing is compared or uploaded.
//!   - **Draining**: artifacts are visited in collection order. Equal content
//!     (exact string equality) is skipped without a network call; anything
//!     else, including ids the server has never seen, is upserted once.
//!
//! Upsert failures are recorded and the drain continues, so partial
//! synchronisation is possible. The exception is an authorisation failure:
//! every following call would fail the same way, so the drain stops and the
//! partial report travels inside [`SyncError::Unauthorized`].
//!
//! # Error Handling
//! Transient sink errors (transport failures, HTTP 5xx) are retried according
//! to [`RetryPolicy`]; upserts are idempotent so repeating them is safe.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting types: [`SyncOptions`], [`SyncReport`].

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind, ChangeRecord, ChangeStatus};
use crate::error::{SinkError, SyncError};
use crate::remote::RemoteSink;

/// Bounded retry with doubling backoff for transient sink errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `1` disables retrying.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum upserts in flight. `1` is strictly sequential.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Detect changes but do not upsert them.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }
}

/// What one sync run did. `change_log` is in collection order.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub kind: ArtifactKind,
    pub applied: usize,
    pub failed: usize,
    pub unchanged: usize,
    pub change_log: Vec<ChangeRecord>,
}

impl SyncReport {
    fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            applied: 0,
            failed: 0,
            unchanged: 0,
            change_log: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Changes detected but not sent because of a dry run.
    pub fn planned(&self) -> usize {
        self.change_log
            .iter()
            .filter(|r| r.status == ChangeStatus::Planned)
            .count()
    }
}

/// Synchronise `artifacts` of one `kind` with `remote`.
pub async fn synchronise<R>(
    kind: ArtifactKind,
    artifacts: &[Artifact],
    remote: &R,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    R: RemoteSink + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("sync", %run_id, %kind);
    run(kind, artifacts, remote, options).instrument(span).await
}

async fn run<R>(
    kind: ArtifactKind,
    artifacts: &[Artifact],
    remote: &R,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    R: RemoteSink + ?Sized,
{
    info!(artifacts = artifacts.len(), "[SYNC] Fetching remote content map");
    let remote_map = with_retry(&options.retry, "fetch_content_map", || {
        remote.fetch_content_map(kind)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Could not fetch remote content map, aborting");
        SyncError::Fetch(e)
    })?;
    info!(remote_entries = remote_map.len(), "[SYNC] Fetched remote content map");

    let mut report = SyncReport::new(kind);
    let mut changed: Vec<&Artifact> = Vec::new();
    for artifact in artifacts {
        if remote_map.get(&artifact.id) == Some(&artifact.content) {
            debug!(id = %artifact.id, "[SYNC] Unchanged, skipping");
            report.unchanged += 1;
        } else {
            changed.push(artifact);
        }
    }

    if options.dry_run {
        for artifact in changed {
            info!(id = %artifact.id, "[SYNC][DRY-RUN] Would upsert");
            report.change_log.push(ChangeRecord::new(
                &artifact.id,
                &artifact.content,
                ChangeStatus::Planned,
            ));
        }
        return Ok(report);
    }

    let retry = &options.retry;
    let mut outcomes = stream::iter(changed)
        .map(|artifact| async move {
            let result = with_retry(retry, "upsert", || {
                remote.upsert(kind, &artifact.id, &artifact.content)
            })
            .await;
            (artifact, result)
        })
        .buffered(options.concurrency.max(1));

    while let Some((artifact, result)) = outcomes.next().await {
        match result {
            Ok(()) => {
                info!(id = %artifact.id, "[SYNC][UPLOAD] Upsert succeeded");
                report.applied += 1;
                report.change_log.push(ChangeRecord::new(
                    &artifact.id,
                    &artifact.content,
                    ChangeStatus::Applied,
                ));
            }
            Err(e) => {
                error!(id = %artifact.id, error = %e, "[SYNC][ERROR][UPLOAD] Upsert failed");
                report.failed += 1;
                report.change_log.push(ChangeRecord::new(
                    &artifact.id,
                    &artifact.content,
                    ChangeStatus::Failed(e.to_string()),
                ));
                if matches!(e, SinkError::Unauthorized(_)) {
                    error!("[SYNC][ERROR] Token rejected, stopping drain");
                    return Err(SyncError::Unauthorized {
                        id: artifact.id.clone(),
                        report: Box::new(report),
                    });
                }
            }
        }
    }

    info!(
        applied = report.applied,
        failed = report.failed,
        unchanged = report.unchanged,
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}

async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, SinkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SinkError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    operation = what,
                    attempt,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
