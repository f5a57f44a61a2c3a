use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use phub_adapters::{
    AdapterEndpoints, AdapterError, AdapterRegistry, PlatformAdapter, ScrapeContext, SourceAccess,
};
use phub_core::{
    CanonicalQuestion, Difficulty, Domain, Platform, PlatformId, QuestionDraft, ScrapingMetadata,
    SourceType, Topic,
};
use phub_storage::{InMemoryQuestionStore, QuestionStore, StoreError};
use phub_sync::{IngestService, JobReport, ScrapeError};
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type CallLog = Arc<Mutex<Vec<String>>>;

fn draft(slug: &str, title: &str) -> QuestionDraft {
    let now = Utc::now();
    QuestionDraft {
        title: title.to_string(),
        description: format!("{title} description"),
        difficulty: Difficulty::Easy,
        platform: Platform::Custom,
        topic: Topic::Other,
        domain: Domain::Dsa,
        source_type: SourceType::Scraped,
        tags: Vec::new(),
        external_url: format!("https://judge.example/{slug}"),
        rating: None,
        is_active: true,
        last_scraped: now,
        scraping_metadata: ScrapingMetadata {
            original_id: slug.to_string(),
            last_updated: now,
            source: "fake".to_string(),
        },
    }
}

/// Records call order; `fail` makes every fetch error out.
struct FakeAdapter {
    id: &'static str,
    drafts: Vec<QuestionDraft>,
    fail: bool,
    log: CallLog,
}

#[async_trait]
impl PlatformAdapter for FakeAdapter {
    fn platform_id(&self) -> PlatformId {
        PlatformId::new(self.id)
    }

    fn platform(&self) -> Platform {
        Platform::Custom
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    async fn fetch_drafts(
        &self,
        _ctx: &ScrapeContext<'_>,
    ) -> Result<Vec<QuestionDraft>, AdapterError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.log.lock().unwrap().push(self.id.to_string());
        if self.fail {
            return Err(AdapterError::Message(format!("{} is down", self.id)));
        }
        Ok(self.drafts.clone())
    }
}

/// Keeps every upserted draft in arrival order.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryQuestionStore,
    upserts: Mutex<Vec<QuestionDraft>>,
}

#[async_trait]
impl QuestionStore for RecordingStore {
    async fn upsert(&self, draft: QuestionDraft) -> Result<CanonicalQuestion, StoreError> {
        self.upserts.lock().unwrap().push(draft.clone());
        self.inner.upsert(draft).await
    }

    async fn find_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<CanonicalQuestion>, StoreError> {
        self.inner.find_by_external_url(external_url).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}

fn fake(id: &'static str, n: usize, fail: bool, log: &CallLog) -> Arc<dyn PlatformAdapter> {
    let drafts = (0..n)
        .map(|i| draft(&format!("{id}-{i}"), &format!("{id} problem {i}")))
        .collect();
    Arc::new(FakeAdapter {
        id,
        drafts,
        fail,
        log: log.clone(),
    })
}

fn ids(names: &[&str]) -> Vec<PlatformId> {
    names.iter().map(PlatformId::new).collect()
}

async fn next_report(reports: &mut broadcast::Receiver<JobReport>) -> JobReport {
    tokio::time::timeout(Duration::from_secs(10), reports.recv())
        .await
        .expect("job report in time")
        .expect("report channel open")
}

#[tokio::test]
async fn jobs_run_fifo_and_platforms_in_order() {
    let log = CallLog::default();
    let mut registry = AdapterRegistry::new();
    for id in ["a", "b", "c"] {
        registry.register(fake(id, 1, false, &log));
    }
    let service = IngestService::builder().registry(registry).build().unwrap();
    let mut reports = service.subscribe();

    let first = service.enqueue_scrape_job(ids(&["a", "b"]), false);
    let second = service.enqueue_scrape_job(ids(&["c"]), false);

    let r1 = next_report(&mut reports).await;
    let r2 = next_report(&mut reports).await;
    assert_eq!((r1.job_id, r2.job_id), (first, second));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(r1.total_ingested(), 2);
    assert_eq!(service.pending_jobs(), 0);
}

#[tokio::test]
async fn failing_platform_does_not_stop_the_next() {
    let log = CallLog::default();
    let mut registry = AdapterRegistry::new();
    registry.register(fake("a", 2, true, &log));
    registry.register(fake("b", 2, false, &log));
    let store = Arc::new(RecordingStore::default());
    let service = IngestService::builder()
        .registry(registry)
        .store(store.clone())
        .build()
        .unwrap();
    let mut reports = service.subscribe();

    service.enqueue_scrape_job(ids(&["a", "b"]), false);
    let report = next_report(&mut reports).await;

    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(report.outcomes[0].ingested, 0);
    assert!(report.outcomes[0].error.as_deref().unwrap().contains("a is down"));
    assert_eq!(report.outcomes[1].ingested, 2);
    assert_eq!(store.count().await.unwrap(), 2);

    // Direct calls report fetch failures as zero, not as errors.
    assert_eq!(service.scrape_platform(&PlatformId::new("a"), false).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_platform_is_logged_inside_a_job() {
    let log = CallLog::default();
    let mut registry = AdapterRegistry::new();
    registry.register(fake("b", 1, false, &log));
    let service = IngestService::builder().registry(registry).build().unwrap();
    let mut reports = service.subscribe();

    service.enqueue_scrape_job(ids(&["nope", "b"]), true);
    let report = next_report(&mut reports).await;
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].ingested, 0);
    assert!(report.outcomes[0].error.as_deref().unwrap().contains("nope"));
    assert_eq!(report.outcomes[1].ingested, 1);

    let err = service
        .scrape_platform(&PlatformId::new("nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::UnknownPlatform(_)));
}

#[tokio::test]
async fn malformed_records_are_skipped_individually() {
    let log = CallLog::default();
    let mut bad = draft("bad", "Broken");
    bad.external_url = "judge.example/no-scheme".to_string();
    let mut untitled = draft("untitled", "   ");
    untitled.external_url = "https://judge.example/untitled".to_string();
    let adapter = Arc::new(FakeAdapter {
        id: "mixed",
        drafts: vec![draft("ok-1", "Fine"), bad, untitled, draft("ok-2", "Also fine")],
        fail: false,
        log,
    });
    let mut registry = AdapterRegistry::new();
    registry.register(adapter);
    let store = Arc::new(RecordingStore::default());
    let service = IngestService::builder()
        .registry(registry)
        .store(store.clone())
        .build()
        .unwrap();

    let n = service.scrape_platform(&PlatformId::new("mixed"), false).await.unwrap();
    assert_eq!(n, 2);
    assert_eq!(store.upserts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn repeated_jobs_keep_one_record_per_url() {
    let log = CallLog::default();
    let mut registry = AdapterRegistry::new();
    registry.register(fake("a", 3, false, &log));
    let store = Arc::new(RecordingStore::default());
    let service = IngestService::builder()
        .registry(registry)
        .store(store.clone())
        .build()
        .unwrap();
    let mut reports = service.subscribe();

    service.enqueue_scrape_job(ids(&["a"]), false);
    service.enqueue_scrape_job(ids(&["a"]), true);
    next_report(&mut reports).await;
    let second = next_report(&mut reports).await;

    assert_eq!(second.total_ingested(), 3);
    assert_eq!(store.upserts.lock().unwrap().len(), 6);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn codeforces_job_end_to_end_against_mocked_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/problemset.problems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": {
                "problems": [
                    {"contestId": 1850, "index": "A", "name": "To My Critics", "rating": 1100, "tags": ["implementation"]},
                    {"contestId": 1850, "index": "B", "name": "Ten Words of Wisdom", "rating": 1550, "tags": ["greedy", "math"]},
                    {"contestId": 1850, "index": "C", "name": "Word on the Paper", "tags": []}
                ],
                "problemStatistics": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = AdapterEndpoints {
        codeforces_api: format!("{}/api/problemset.problems", server.uri()),
        ..Default::default()
    };
    let store = Arc::new(RecordingStore::default());
    let service = IngestService::builder()
        .registry(AdapterRegistry::with_defaults(&endpoints))
        .store(store.clone())
        .build()
        .unwrap();
    let mut reports = service.subscribe();

    service.enqueue_scrape_job(ids(&["codeforces"]), false);
    let report = next_report(&mut reports).await;
    assert_eq!(report.total_ingested(), 3);

    let upserts = store.upserts.lock().unwrap().clone();
    assert_eq!(
        upserts.iter().map(|d| d.difficulty).collect::<Vec<_>>(),
        vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Medium]
    );
    assert!(upserts.iter().all(|d| d.domain == Domain::Cp));
    assert_eq!(upserts[1].topic, Topic::Greedy);
    assert_eq!(
        upserts[2].external_url,
        "https://codeforces.com/problemset/problem/1850/C"
    );
}

#[tokio::test]
async fn degraded_sweep_never_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/problemset.problems"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let endpoints = AdapterEndpoints {
        leetcode_graphql: format!("{}/graphql", server.uri()),
        codeforces_api: format!("{}/api/problemset.problems", server.uri()),
        ..Default::default()
    };
    let service = IngestService::builder()
        .registry(AdapterRegistry::with_defaults(&endpoints))
        .build()
        .unwrap();

    let summary = service.run_sweep(false).await;
    let by_platform = summary
        .outcomes
        .iter()
        .map(|o| (o.platform.as_str(), o.ingested, o.error.is_some()))
        .collect::<Vec<_>>();
    assert_eq!(
        by_platform,
        vec![("leetcode", 0, true), ("codeforces", 0, true), ("gfg", 5, false)]
    );
    assert_eq!(summary.total_ingested, 5);
    assert_eq!(service.store().count().await.unwrap(), 5);

    service.shutdown().await;
    service.shutdown().await;
}
