//! Ingestion orchestration: the scrape queue, one-shot scrapes, daily sweeps
//! and the cron scheduler wiring.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_adapters::{
    detect_browser_capability, AdapterEndpoints, AdapterRegistry, BrowserController,
    ScrapeContext,
};
use phub_core::PlatformId;
use phub_storage::{
    HttpClientConfig, HttpFetcher, InMemoryQuestionStore, PgQuestionStore, QuestionStore,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod config;
pub mod queue;

pub use config::{build_registry, IngestConfig, PlatformConfig, PlatformRegistryFile, PLATFORMS_FILE};
pub use queue::{JobId, JobReport, PlatformOutcome, PlatformScraper, ScrapeJob, ScrapeQueue};

pub const CRATE_NAME: &str = "phub-sync";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no adapter registered for platform `{0}`")]
    UnknownPlatform(PlatformId),
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<PlatformOutcome>,
    pub total_ingested: usize,
}

/// Everything a single platform scrape needs. Shared between the queue
/// worker and direct callers.
struct IngestCore {
    registry: AdapterRegistry,
    store: Arc<dyn QuestionStore>,
    http: HttpFetcher,
    browser: BrowserController,
}

impl IngestCore {
    async fn scrape_outcome(
        &self,
        platform: &PlatformId,
        force: bool,
        run_id: Uuid,
    ) -> Result<PlatformOutcome, ScrapeError> {
        let adapter = self
            .registry
            .get(platform)
            .ok_or_else(|| ScrapeError::UnknownPlatform(platform.clone()))?;

        let span = info_span!("scrape_platform", platform = %platform, %run_id, force);
        async move {
            let ctx = ScrapeContext {
                force,
                fetched_at: Utc::now(),
                http: &self.http,
                browser: &self.browser,
            };

            let drafts = match adapter.fetch_drafts(&ctx).await {
                Ok(drafts) => drafts,
                Err(err) => {
                    warn!(error = %err, "fetch failed; nothing ingested");
                    return Ok(PlatformOutcome::failed(platform.clone(), err));
                }
            };

            let fetched = drafts.len();
            let mut ingested = 0usize;
            for draft in drafts {
                let draft = match draft.validate() {
                    Ok(draft) => draft,
                    Err(err) => {
                        warn!(error = %err, "skipping malformed record");
                        continue;
                    }
                };
                let external_url = draft.external_url.clone();
                match self.store.upsert(draft).await {
                    Ok(_) => ingested += 1,
                    Err(err) => warn!(%external_url, error = %err, "upsert failed"),
                }
            }

            info!(fetched, ingested, "platform scrape finished");
            Ok(PlatformOutcome {
                platform: platform.clone(),
                ingested,
                error: None,
            })
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl PlatformScraper for IngestCore {
    async fn scrape(
        &self,
        platform: &PlatformId,
        force: bool,
        run_id: Uuid,
    ) -> Result<PlatformOutcome, ScrapeError> {
        self.scrape_outcome(platform, force, run_id).await
    }
}

/// One per process. Owns the queue worker, the shared browser and the store.
pub struct IngestService {
    core: Arc<IngestCore>,
    queue: ScrapeQueue,
    sweep_platforms: Vec<PlatformId>,
}

#[derive(Default)]
pub struct IngestServiceBuilder {
    registry: Option<AdapterRegistry>,
    store: Option<Arc<dyn QuestionStore>>,
    http: Option<HttpFetcher>,
    browser: Option<BrowserController>,
    sweep_platforms: Option<Vec<PlatformId>>,
}

impl IngestServiceBuilder {
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(mut self, store: Arc<dyn QuestionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn http(mut self, http: HttpFetcher) -> Self {
        self.http = Some(http);
        self
    }

    pub fn browser(mut self, browser: BrowserController) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Defaults to every registered platform in registration order.
    pub fn sweep_platforms(mut self, platforms: Vec<PlatformId>) -> Self {
        self.sweep_platforms = Some(platforms);
        self
    }

    /// Spawns the queue worker, so this must run inside a tokio runtime.
    pub fn build(self) -> Result<IngestService> {
        let registry = self
            .registry
            .unwrap_or_else(|| AdapterRegistry::with_defaults(&AdapterEndpoints::default()));
        let http = match self.http {
            Some(http) => http,
            None => HttpFetcher::new(HttpClientConfig::default()).context("building http client")?,
        };
        let sweep_platforms = self
            .sweep_platforms
            .unwrap_or_else(|| registry.platform_ids());

        let core = Arc::new(IngestCore {
            registry,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryQuestionStore::new())),
            http,
            browser: self.browser.unwrap_or_else(BrowserController::degraded),
        });
        let queue = ScrapeQueue::start(core.clone());

        Ok(IngestService {
            core,
            queue,
            sweep_platforms,
        })
    }
}

impl IngestService {
    pub fn builder() -> IngestServiceBuilder {
        IngestServiceBuilder::default()
    }

    /// Wires the production stack: Postgres when `DATABASE_URL` is set,
    /// Browserless when `BROWSERLESS_URL` is set, `platforms.yaml` when present.
    pub async fn from_config(config: &IngestConfig) -> Result<Self> {
        let file = PlatformRegistryFile::load(&config.workspace_root)?;
        let (registry, sweep_platforms) = build_registry(file.as_ref());

        let store: Arc<dyn QuestionStore> = match &config.database_url {
            Some(url) => {
                let pg = PgQuestionStore::connect(url)
                    .await
                    .context("connecting to postgres")?;
                pg.migrate().await.context("running migrations")?;
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set; questions are kept in memory only");
                Arc::new(InMemoryQuestionStore::new())
            }
        };

        let http = HttpFetcher::new(config.http_client_config()).context("building http client")?;
        let browser = detect_browser_capability(
            config.browserless_url.as_deref(),
            config.browserless_token.as_deref(),
            config.http_timeout(),
        );

        Self::builder()
            .registry(registry)
            .store(store)
            .http(http)
            .browser(browser)
            .sweep_platforms(sweep_platforms)
            .build()
    }

    /// Queues a job and returns at once; platforms run later in order.
    pub fn enqueue_scrape_job(&self, platforms: Vec<PlatformId>, force: bool) -> JobId {
        let job_id = self.queue.enqueue(platforms, force);
        info!(%job_id, force, "scrape job queued");
        job_id
    }

    /// Scrapes one platform now, bypassing the queue. Fetch failures yield
    /// `Ok(0)`; only an unregistered platform is an error.
    pub async fn scrape_platform(&self, platform: &PlatformId, force: bool) -> Result<usize, ScrapeError> {
        self.core
            .scrape_outcome(platform, force, Uuid::now_v7())
            .await
            .map(|outcome| outcome.ingested)
    }

    pub async fn run_sweep(&self, force: bool) -> SweepSummary {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let span = info_span!("sweep", %run_id, force);

        let outcomes = async {
            let mut outcomes = Vec::with_capacity(self.sweep_platforms.len());
            for platform in &self.sweep_platforms {
                let outcome = match self.core.scrape_outcome(platform, force, run_id).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(error = %err, "sweep platform skipped");
                        PlatformOutcome::failed(platform.clone(), err)
                    }
                };
                outcomes.push(outcome);
            }
            outcomes
        }
        .instrument(span)
        .await;

        let total_ingested = outcomes.iter().map(|o| o.ingested).sum();
        info!(%run_id, total_ingested, platforms = outcomes.len(), "sweep complete");
        SweepSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            total_ingested,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobReport> {
        self.queue.subscribe()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.pending_jobs()
    }

    pub fn sweep_platforms(&self) -> &[PlatformId] {
        &self.sweep_platforms
    }

    pub fn store(&self) -> Arc<dyn QuestionStore> {
        self.core.store.clone()
    }

    pub fn browser(&self) -> &BrowserController {
        &self.core.browser
    }

    pub async fn close_browser(&self) {
        self.core.browser.release().await;
    }

    /// Safe to call repeatedly. Queued jobs that have not started are
    /// abandoned when the service is dropped.
    pub async fn shutdown(&self) {
        let pending = self.pending_jobs();
        if pending > 0 {
            warn!(pending, "shutting down with scrape jobs still queued");
        }
        self.close_browser().await;
        info!("ingest service shut down");
    }
}

/// A cron job running `run_sweep(false)`, or `None` when scheduling is off.
pub async fn maybe_build_scheduler(
    service: Arc<IngestService>,
    config: &IngestConfig,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = &config.sweep_cron;
    let job = Job::new_async(cron, move |_uuid, _l| {
        let service = service.clone();
        Box::pin(async move {
            let summary = service.run_sweep(false).await;
            info!(run_id = %summary.run_id, total = summary.total_ingested, "scheduled sweep finished");
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}
