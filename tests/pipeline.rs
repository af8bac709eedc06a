//! End-to-end pipeline tests over scripted browser sessions.
//!
//! Sessions serve canned HTML keyed by URL, so the full dequeue ->
//! navigate -> extract -> persist flow runs without a browser. The store
//! is either the real SQLite store on a temp directory or an in-memory
//! fake with failure injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gleaner::browser::{FetchError, FetchedPage, PageSession, SessionFactory};
use gleaner::error::JobError;
use gleaner::extract::{ExtractOptions, StrategyRegistry};
use gleaner::models::{
    ExtractedRecord, Job, JobParameters, JobStatus, JobUpdate, ResultSummary,
};
use gleaner::progress::ProgressSink;
use gleaner::queue::{JobProducer, JobQueue, MemoryJobQueue, QueuedJob};
use gleaner::store::{AsyncSqlitePool, ContentStore, DieselStore, RecordQuery, StoreError};
use gleaner::worker::WorkerPool;

// ---------------------------------------------------------------------------
// Scripted browser session
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Script {
    pages: Arc<Mutex<HashMap<String, String>>>,
    fetch_log: Arc<Mutex<Vec<String>>>,
    sessions_opened: Arc<AtomicUsize>,
    sessions_closed: Arc<AtomicUsize>,
}

impl Script {
    fn new() -> Self {
        Self::default()
    }

    fn page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    fn fetched_urls(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    script: Script,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.script.fetch_log.lock().unwrap().push(url.to_string());
        let pages = self.script.pages.lock().unwrap();
        match pages.get(url) {
            Some(html) => Ok(FetchedPage {
                requested_url: url.to_string(),
                final_url: url.to_string(),
                html: html.clone(),
            }),
            None => Err(FetchError::Navigation(format!("connection refused: {url}"))),
        }
    }

    async fn close(self: Box<Self>) {
        self.closed.store(true, Ordering::SeqCst);
        self.script.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedFactory {
    script: Script,
    last_session_closed: Arc<AtomicBool>,
}

impl ScriptedFactory {
    fn new(script: Script) -> Self {
        Self {
            script,
            last_session_closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        self.script.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.last_session_closed.store(false, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            closed: Arc::clone(&self.last_session_closed),
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory store with failure injection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemStoreState {
    jobs: Vec<Job>,
    records: Vec<ExtractedRecord>,
    update_log: Vec<(String, Option<JobStatus>)>,
}

#[derive(Default)]
struct MemStore {
    state: Mutex<MemStoreState>,
    saves_attempted: AtomicUsize,
    /// Fail every Nth save_record call (0 disables).
    fail_every: usize,
}

impl MemStore {
    fn new() -> Self {
        Self::default()
    }

    fn failing_every(fail_every: usize) -> Self {
        Self {
            fail_every,
            ..Default::default()
        }
    }

    fn update_statuses(&self, job_id: &str) -> Vec<JobStatus> {
        self.state
            .lock()
            .unwrap()
            .update_log
            .iter()
            .filter(|(id, _)| id == job_id)
            .filter_map(|(_, status)| *status)
            .collect()
    }

    fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

#[async_trait]
impl ContentStore for MemStore {
    async fn create_job(&self, job: &Job) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.jobs.iter().find(|j| j.job_id == job.job_id) {
            return Ok(existing.id);
        }
        let mut stored = job.clone();
        stored.id = state.jobs.len() as i64 + 1;
        let id = stored.id;
        state.jobs.push(stored);
        Ok(id)
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .update_log
            .push((job_id.to_string(), update.status));
        if let Some(job) = state.jobs.iter_mut().find(|j| j.job_id == job_id) {
            if let Some(status) = update.status {
                job.status = status;
            }
            if update.completed_at.is_some() {
                job.completed_at = update.completed_at;
            }
            if update.error_message.is_some() {
                job.error_message = update.error_message;
            }
            if update.result_summary.is_some() {
                job.result_summary = update.result_summary;
            }
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .cloned())
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|j| status.map(|s| j.status == s).unwrap_or(true))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn job_counts(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut counts = BTreeMap::new();
        for job in &self.state.lock().unwrap().jobs {
            *counts.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn save_record(&self, record: &ExtractedRecord) -> Result<i64, StoreError> {
        let attempt = self.saves_attempted.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && attempt % self.fail_every == 0 {
            return Err(StoreError::Connection("injected write failure".into()));
        }
        let mut state = self.state.lock().unwrap();
        let mut stored = record.clone();
        stored.id = state.records.len() as i64 + 1;
        let id = stored.id;
        state.records.push(stored);
        Ok(id)
    }

    async fn list_records(&self, query: RecordQuery) -> Result<Vec<ExtractedRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| query.source.as_deref().map(|s| r.source == s).unwrap_or(true))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn record_counts(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut counts = BTreeMap::new();
        for record in &self.state.lock().unwrap().records {
            *counts.entry(record.source.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Progress recorder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingProgress {
    percents: Mutex<Vec<u8>>,
    terminal: Mutex<Option<(JobStatus, Option<usize>)>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }

    fn on_terminal(&self, status: JobStatus, summary: Option<&ResultSummary>) {
        *self.terminal.lock().unwrap() = Some((status, summary.map(|s| s.count)));
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn quotes_page(count: usize) -> String {
    let mut body = String::from(
        "<html><head><title>Quotes to Scrape</title></head><body><div class=\"col-md-8\">",
    );
    for i in 0..count {
        body.push_str(&format!(
            r#"<div class="quote">
                <span class="text">“Quote number {i}”</span>
                <small class="author">Author {i}</small>
                <div class="tags"><a class="tag">life</a></div>
            </div>"#
        ));
    }
    body.push_str("</div></body></html>");
    body
}

fn quotes_page_with_broken_unit(count: usize) -> String {
    let mut page = quotes_page(count);
    // One container with no text node at all.
    page = page.replace(
        "</div></body></html>",
        r#"<div class="quote"><small class="author">Ghost</small></div></div></body></html>"#,
    );
    page
}

fn reddit_listing(posts: usize) -> String {
    let mut body = String::from(
        "<html><head><title>reddit: the front page</title></head><body><div id=\"siteTable\">",
    );
    for i in 0..posts {
        body.push_str(&format!(
            r#"<div class="thing" data-fullname="t3_{i}" data-subreddit="rust" data-permalink="/r/rust/comments/{i}/post/">
                <p class="title"><a class="title" href="/r/rust/comments/{i}/post/">Post number {i}</a></p>
                <a class="author">user{i}</a>
                <div class="score unvoted">{score}</div>
                <a class="comments">{i} comments</a>
            </div>"#,
            score = (posts - i) * 10,
        ));
    }
    body.push_str("</div></body></html>");
    body
}

fn reddit_shell_with_titles() -> String {
    r#"<html><head><title>reddit - dive into anything</title></head><body>
        <main><h3>Shell title one</h3><h3>Shell title two</h3></main>
    </body></html>"#
        .to_string()
}

async fn sqlite_store(dir: &tempfile::TempDir) -> Arc<DieselStore> {
    let db_path = dir.path().join("test.db");
    gleaner::store::run_migrations(&db_path.display().to_string())
        .await
        .unwrap();
    Arc::new(DieselStore::new(AsyncSqlitePool::from_path(&db_path)))
}

fn fast_options() -> ExtractOptions {
    ExtractOptions {
        nav_timeout_secs: 5,
        page_delay_ms: 0,
    }
}

struct Harness {
    queue: Arc<MemoryJobQueue>,
    store: Arc<dyn ContentStore>,
    producer: JobProducer,
    pool: Arc<WorkerPool>,
    factory_closed: Arc<AtomicBool>,
}

fn harness(store: Arc<dyn ContentStore>, script: Script, export_dir: Option<std::path::PathBuf>) -> Harness {
    let queue = Arc::new(MemoryJobQueue::new());
    let registry = Arc::new(StrategyRegistry::with_defaults(fast_options()));
    let factory = Arc::new(ScriptedFactory::new(script.clone()));
    let factory_closed = Arc::clone(&factory.last_session_closed);

    let producer = JobProducer::new(
        queue.clone(),
        Arc::clone(&store),
        Arc::clone(&registry),
    );
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        Arc::clone(&store),
        registry,
        factory,
        export_dir,
        2,
    ));

    Harness {
        queue,
        store,
        producer,
        pool,
        factory_closed,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quotes_job_paginates_and_persists_all_records() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(10));
    script.page("http://quotes.toscrape.com/page/2/", &quotes_page(10));

    let store = sqlite_store(&dir).await;
    let export_dir = dir.path().join("exports");
    let h = harness(store.clone(), script, Some(export_dir.clone()));

    let job_id = h
        .producer
        .submit(
            "quotes",
            JobParameters {
                max_pages: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());

    let summary = job.result_summary.unwrap();
    assert_eq!(summary.count, 20);
    assert_eq!(summary.by_type.get("quote"), Some(&20));

    let records = h
        .store
        .list_records(RecordQuery {
            source: Some("quotes".into()),
            limit: 100,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 20);

    // Side output: one flat-text artifact per quotes job.
    let export = export_dir.join(format!("job-{job_id}.txt"));
    assert!(export.exists());
}

#[tokio::test]
async fn pagination_stops_on_empty_page_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(10));
    script.page("http://quotes.toscrape.com/page/2/", &quotes_page(0));
    script.page("http://quotes.toscrape.com/page/3/", &quotes_page(10));

    let store = sqlite_store(&dir).await;
    let h = harness(store, script.clone(), None);

    let job_id = h
        .producer
        .submit(
            "quotes",
            JobParameters {
                max_pages: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result_summary.unwrap().count, 10);

    // Page 3 must never be requested after page 2 came back empty.
    let fetched = script.fetched_urls();
    assert!(fetched.contains(&"http://quotes.toscrape.com/page/2/".to_string()));
    assert!(!fetched.iter().any(|u| u.contains("/page/3/")));
}

#[tokio::test]
async fn candidate_ladder_resolves_first_passing_candidate() {
    let script = Script::new();
    // Legacy host works; canonical host must never be touched.
    script.page("https://old.reddit.com/r/rust/", &reddit_listing(5));
    script.page("https://www.reddit.com/r/rust/", &reddit_listing(5));

    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store, script.clone(), None);

    let job_id = h
        .producer
        .submit(
            "discussion",
            JobParameters {
                url: Some("https://www.reddit.com/r/rust/".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let fetched = script.fetched_urls();
    assert_eq!(fetched, vec!["https://old.reddit.com/r/rust/".to_string()]);
}

#[tokio::test]
async fn candidate_ladder_advances_past_failing_candidates() {
    let script = Script::new();
    // Legacy host refuses the connection; canonical host serves content.
    script.page("https://www.reddit.com/r/rust/", &reddit_listing(3));

    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store, script.clone(), None);

    let job_id = h
        .producer
        .submit(
            "discussion",
            JobParameters {
                url: Some("https://www.reddit.com/r/rust/".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let fetched = script.fetched_urls();
    assert_eq!(
        fetched,
        vec![
            "https://old.reddit.com/r/rust/".to_string(),
            "https://www.reddit.com/r/rust/".to_string(),
        ]
    );

    // Records carry the resolved candidate as their source URL.
    let records = h.store.list_records(RecordQuery::default()).await.unwrap();
    assert!(records
        .iter()
        .all(|r| r.source_url == "https://www.reddit.com/r/rust/"));
}

#[tokio::test]
async fn exhausted_ladder_fails_job_with_last_error() {
    let script = Script::new(); // no pages: every candidate fails

    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store, script, None);

    let job_id = h
        .producer
        .submit(
            "discussion",
            JobParameters {
                url: Some("https://www.reddit.com/r/rust/".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed_at.is_some());

    let message = job.error_message.unwrap();
    assert!(message.contains("candidate URLs exhausted"));
    assert!(message.contains("connection refused"));

    // The session must still have been torn down.
    assert!(h.factory_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn discussion_fallback_recovers_titles_when_primary_matches_nothing() {
    let script = Script::new();
    script.page("https://old.reddit.com/r/rust/", &reddit_shell_with_titles());

    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store, script, None);

    let job_id = h
        .producer
        .submit(
            "discussion",
            JobParameters {
                url: Some("https://old.reddit.com/r/rust/".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let summary = job.result_summary.unwrap();
    assert_eq!(summary.count, 2);

    let records = h.store.list_records(RecordQuery::default()).await.unwrap();
    let titles: Vec<_> = records.iter().filter_map(|r| r.title.clone()).collect();
    assert!(titles.contains(&"Shell title one".to_string()));
}

#[tokio::test]
async fn unknown_job_type_is_rejected_before_any_session_opens() {
    let script = Script::new();
    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store, script.clone(), None);

    let result = h.producer.submit("podcasts", JobParameters::default()).await;
    assert!(matches!(result, Err(JobError::UnknownJobType(ref ty)) if ty == "podcasts"));

    // Nothing was enqueued, stored, or opened.
    assert_eq!(h.queue.depth().await, 0);
    assert!(h.store.list_jobs(None, 10).await.unwrap().is_empty());
    assert_eq!(script.sessions_opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_unit_is_skipped_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::new();
    script.page(
        "http://quotes.toscrape.com/page/1/",
        &quotes_page_with_broken_unit(9),
    );

    let store = sqlite_store(&dir).await;
    let h = harness(store, script, None);

    let job_id = h
        .producer
        .submit("quotes", JobParameters::default())
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result_summary.unwrap().count, 9);
}

#[tokio::test]
async fn persisted_count_reflects_only_successful_writes() {
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(10));

    let store = Arc::new(MemStore::failing_every(5));
    let h = harness(store.clone(), script, None);

    let job_id = h
        .producer
        .submit("quotes", JobParameters::default())
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let job = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    // Every 5th write failed: 10 units, 8 stored. The summary must never
    // claim more than what was written.
    let summary = job.result_summary.unwrap();
    assert_eq!(summary.count, 8);
    assert_eq!(store.record_count(), 8);
}

#[tokio::test]
async fn job_status_transitions_follow_the_lifecycle_graph() {
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(2));

    let store = Arc::new(MemStore::new());
    let h = harness(store.clone(), script, None);

    let job_id = h
        .producer
        .submit("quotes", JobParameters::default())
        .await
        .unwrap();

    h.queue.close().await;
    Arc::clone(&h.pool).run().await;

    let statuses = store.update_statuses(&job_id);
    assert_eq!(statuses, vec![JobStatus::Active, JobStatus::Completed]);

    // Every observed transition is legal, starting from pending.
    let mut current = JobStatus::Pending;
    for next in statuses {
        assert!(
            current.can_transition_to(next),
            "illegal transition {} -> {}",
            current.as_str(),
            next.as_str()
        );
        current = next;
    }
}

#[tokio::test]
async fn progress_milestones_are_reported_in_order() {
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(3));

    let store: Arc<dyn ContentStore> = Arc::new(MemStore::new());
    let h = harness(store.clone(), script, None);

    let job_id = h
        .producer
        .submit("quotes", JobParameters::default())
        .await
        .unwrap();
    let job = h.store.get_job(&job_id).await.unwrap().unwrap();

    let progress = RecordingProgress::default();
    let queued = QueuedJob {
        job_id: job.job_id.clone(),
        job_type: job.job_type,
        parameters: job.parameters.clone(),
    };
    let summary = h.pool.process_job(&queued, &progress).await.unwrap();
    assert_eq!(summary.count, 3);

    let percents = progress.percents.lock().unwrap().clone();
    assert_eq!(percents, vec![10, 30, 75, 95, 100]);

    let terminal = progress.terminal.lock().unwrap().unwrap();
    assert_eq!(terminal, (JobStatus::Completed, Some(3)));
}

#[tokio::test]
async fn priority_biases_order_across_a_single_worker() {
    let script = Script::new();
    script.page("http://quotes.toscrape.com/page/1/", &quotes_page(1));

    let store = Arc::new(MemStore::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let registry = Arc::new(StrategyRegistry::with_defaults(fast_options()));
    let factory = Arc::new(ScriptedFactory::new(script));
    let producer = JobProducer::new(
        queue.clone(),
        store.clone(),
        Arc::clone(&registry),
    );
    // Single worker so completion order mirrors dequeue order.
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        store.clone(),
        registry,
        factory,
        None,
        1,
    ));

    let low = producer
        .submit(
            "quotes",
            JobParameters {
                priority: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let high = producer
        .submit(
            "quotes",
            JobParameters {
                priority: 9,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    queue.close().await;
    pool.run().await;

    let state = store.state.lock().unwrap();
    let first_active = state
        .update_log
        .iter()
        .find(|(_, status)| *status == Some(JobStatus::Active))
        .map(|(id, _)| id.clone())
        .unwrap();
    drop(state);

    assert_eq!(first_active, high);
    assert_ne!(first_active, low);
}
