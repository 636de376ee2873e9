/// # light-sync CLI Interface (Module)
///
/// This module implements the CLI for light-sync: command parsing, job orchestration and the
/// user-visible summary. Collection, change detection and the sinks live in
/// [`light-sync-core`]; this module only wires them to a [`LightSession`] and the loaded config.
///
/// ## How To Use
/// - For command-line users: `light-sync sync --config <path> [--kind page|rule] [--dry-run]`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`], or drive a
///   single job against any [`RemoteSink`] with [`run_job`].
///
/// [`light-sync-core`]: ../../light_sync_core/
use crate::client::{LightClient, LightSession};
use crate::load_config::{load_config, JobSection};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use light_sync_core::collect::collect;
use light_sync_core::docstore::{mirror_rules, JsonFileStore};
use light_sync_core::remote::{Authenticator, RemoteSink};
use light_sync_core::sql::write_sql_file;
use light_sync_core::{
    synchronise, ArtifactKind, ChangeStatus, SinkError, SyncError, SyncOptions, SyncReport,
};
use std::path::PathBuf;

/// CLI for light-sync: push changed pages and rules to a Light server.
#[derive(Parser)]
#[clap(
    name = "light-sync",
    version,
    about = "Synchronise HTML pages and Java rules from source trees to a Light server"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect, diff and upsert every job in the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Only run the jobs of this kind (page or rule)
        #[clap(long)]
        kind: Option<ArtifactKind>,
        /// Log in, fetch and diff, but do not upsert or write any sink
        #[clap(long)]
        dry_run: bool,
    },
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub kind: ArtifactKind,
    pub collected: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub applied: usize,
    pub failed: usize,
    pub planned: Vec<String>,
    /// Set when the job stopped early or a sink could not be written.
    pub error: Option<String>,
    /// The server rejected our token; later jobs would fail the same way.
    pub unauthorized: bool,
}

impl JobSummary {
    fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            collected: 0,
            skipped: 0,
            unchanged: 0,
            applied: 0,
            failed: 0,
            planned: Vec::new(),
            error: None,
            unauthorized: false,
        }
    }

    fn absorb(&mut self, report: &SyncReport) {
        self.unchanged = report.unchanged;
        self.applied = report.applied;
        self.failed = report.failed;
        self.planned = report
            .change_log
            .iter()
            .filter(|r| r.status == ChangeStatus::Planned)
            .map(|r| r.id.clone())
            .collect();
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs: Vec<JobSummary>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.jobs.iter().all(JobSummary::succeeded)
    }

    /// 0 when every job succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

/// Run one job: collect, synchronise against `remote`, then write the configured sinks.
///
/// Never returns an error; failures are recorded in the summary so later jobs still run.
pub async fn run_job<R>(job: &JobSection, remote: &R, options: &SyncOptions) -> JobSummary
where
    R: RemoteSink + ?Sized,
{
    let mut summary = JobSummary::new(job.kind);

    let collection = match collect(&job.roots, &job.predicate()) {
        Ok(collection) => collection,
        Err(e) => {
            tracing::error!(kind = %job.kind, error = %e, "[SYNC][ERROR] Collection failed");
            summary.error = Some(e.to_string());
            return summary;
        }
    };
    summary.collected = collection.artifacts.len();
    summary.skipped = collection.skipped.len();
    for skipped in &collection.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = ?skipped.reason, "Skipped file");
    }

    let report = match synchronise(job.kind, &collection.artifacts, remote, options).await {
        Ok(report) => report,
        Err(SyncError::Unauthorized { id, report }) => {
            tracing::error!(kind = %job.kind, id = %id, "[SYNC][ERROR] Run aborted: unauthorized");
            summary.error = Some(format!("upsert of '{id}' was rejected as unauthorized"));
            summary.unauthorized = true;
            // Changes applied before the abort still reach the sinks.
            *report
        }
        Err(e) => {
            tracing::error!(kind = %job.kind, error = %e, "[SYNC][ERROR] Synchronisation failed");
            summary.unauthorized = matches!(e, SyncError::Fetch(SinkError::Unauthorized(_)));
            summary.error = Some(e.to_string());
            return summary;
        }
    };
    summary.absorb(&report);

    if options.dry_run {
        return summary;
    }

    if let Some(path) = &job.sql_output {
        if let Err(e) = write_sql_file(path, &report, &job.encoding) {
            tracing::error!(path = %path.display(), error = %e, "[SYNC][ERROR] SQL export failed");
            summary.error.get_or_insert(e.to_string());
        }
    }
    if let Some(dir) = &job.document_store {
        let store = JsonFileStore::new(dir);
        if let Err(e) = mirror_rules(&store, &report) {
            tracing::error!(
                dir = %dir.display(),
                error = %e,
                "[SYNC][ERROR] Document store mirror failed"
            );
            summary.error.get_or_insert(e.to_string());
        }
    }
    summary
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    for job in &summary.jobs {
        println!(
            "[{}] collected={} skipped={} unchanged={} applied={} failed={}",
            job.kind, job.collected, job.skipped, job.unchanged, job.applied, job.failed
        );
        for id in &job.planned {
            println!("  would upsert {id}");
        }
        if let Some(error) = &job.error {
            println!("  error: {error}");
        }
    }
    if dry_run {
        println!("Synchronise dry run complete.");
    } else if summary.succeeded() {
        println!("Synchronise complete.");
    } else {
        println!("Synchronise finished with failures.");
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<RunSummary> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            kind,
            dry_run,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", dry_run, "Starting synchronisation process");

            let jobs: Vec<&JobSection> = config
                .jobs
                .iter()
                .filter(|job| kind.map_or(true, |k| job.kind == k))
                .collect();

            let client = LightClient::new(&config.server.url, config.server.timeout())
                .context("Failed to construct Light client")?;
            let token = client
                .login(
                    &config.server.user,
                    &config.server.password,
                    &config.server.client_id,
                )
                .await
                .context("Login to Light server failed")?;
            let session = LightSession::new(client, token);
            let options = config.sync.options(dry_run);

            println!("Synchronise starting...");
            let mut summary = RunSummary::default();
            for job in jobs {
                let outcome = run_job(job, &session, &options).await;
                let stop = outcome.unauthorized;
                summary.jobs.push(outcome);
                if stop {
                    tracing::error!("[SYNC][ERROR] Token rejected; skipping remaining jobs");
                    break;
                }
            }

            print_summary(&summary, dry_run);
            tracing::info!(command = "sync", ?summary, "Synchronisation complete");
            Ok(summary)
        }
    }
}
