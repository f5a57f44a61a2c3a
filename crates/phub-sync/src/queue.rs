//! In-memory FIFO scrape queue drained by one dedicated worker task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::PlatformId;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ScrapeError;

/// Time-ordered job token.
pub type JobId = Uuid;

const REPORT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeJob {
    pub id: JobId,
    pub platforms: Vec<PlatformId>,
    pub force: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformOutcome {
    pub platform: PlatformId,
    pub ingested: usize,
    pub error: Option<String>,
}

impl PlatformOutcome {
    pub fn failed(platform: PlatformId, error: impl ToString) -> Self {
        Self {
            platform,
            ingested: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<PlatformOutcome>,
}

impl JobReport {
    pub fn total_ingested(&self) -> usize {
        self.outcomes.iter().map(|o| o.ingested).sum()
    }
}

/// What the worker calls for each platform of a job.
#[async_trait]
pub trait PlatformScraper: Send + Sync + 'static {
    async fn scrape(
        &self,
        platform: &PlatformId,
        force: bool,
        run_id: Uuid,
    ) -> Result<PlatformOutcome, ScrapeError>;
}

pub struct ScrapeQueue {
    tx: mpsc::UnboundedSender<ScrapeJob>,
    reports: broadcast::Sender<JobReport>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl ScrapeQueue {
    /// Spawns the worker; must be called inside a tokio runtime.
    pub fn start(scraper: Arc<dyn PlatformScraper>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(drain(scraper, rx, reports.clone(), pending.clone()));
        Self {
            tx,
            reports,
            pending,
            worker,
        }
    }

    /// Never blocks and always hands back a job id.
    pub fn enqueue(&self, platforms: Vec<PlatformId>, force: bool) -> JobId {
        let job = ScrapeJob {
            id: Uuid::now_v7(),
            platforms,
            force,
            created_at: Utc::now(),
        };
        let id = job.id;
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.tx.send(job) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            error!(job_id = %err.0.id, "scrape worker is gone; job dropped");
        }
        id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobReport> {
        self.reports.subscribe()
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for ScrapeQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn drain(
    scraper: Arc<dyn PlatformScraper>,
    mut rx: mpsc::UnboundedReceiver<ScrapeJob>,
    reports: broadcast::Sender<JobReport>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(job) = rx.recv().await {
        let span = info_span!("scrape_job", job_id = %job.id, force = job.force);
        let report = run_job(&scraper, &job).instrument(span).await;
        pending.fetch_sub(1, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = reports.send(report);
    }
}

async fn run_job(scraper: &Arc<dyn PlatformScraper>, job: &ScrapeJob) -> JobReport {
    let started_at = Utc::now();
    info!(platforms = ?job.platforms, "processing scrape job");

    let mut outcomes = Vec::with_capacity(job.platforms.len());
    for platform in &job.platforms {
        // Each platform runs in its own task so a panicking adapter only
        // costs that platform; awaiting it keeps platforms strictly ordered.
        let task = {
            let scraper = scraper.clone();
            let platform = platform.clone();
            let (force, run_id) = (job.force, job.id);
            tokio::spawn(async move { scraper.scrape(&platform, force, run_id).await })
        };

        let outcome = match task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(platform = %platform, error = %err, "platform skipped");
                PlatformOutcome::failed(platform.clone(), err)
            }
            Err(join_err) => {
                error!(platform = %platform, error = %join_err, "platform scrape aborted");
                PlatformOutcome::failed(platform.clone(), join_err)
            }
        };
        outcomes.push(outcome);
    }

    let report = JobReport {
        job_id: job.id,
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    info!(ingested = report.total_ingested(), "completed scrape job");
    report
}
