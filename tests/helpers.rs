#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobscout::store::MemoryJobStore;
use jobscout::tasks::register_default_tasks;
use jobscout::{
    CandidateProfile, DomainStore, JobBoardClient, JobListing, MatchAnalyzer, MatchRecommendation,
    MatchReport, ScanSettings, SearchQuery, ServiceError, Services, WorkerOptions,
};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// A counter which can be statically initialized, to count handler runs
/// from inside task closures.
pub struct StaticCounter {
    cell: OnceCell<AsyncMutex<u32>>,
}

impl StaticCounter {
    async fn mutex(&self) -> &AsyncMutex<u32> {
        self.cell.get_or_init(|| async { AsyncMutex::new(0) }).await
    }

    pub const fn new() -> Self {
        StaticCounter {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn increment(&self) {
        let mutex = self.mutex().await;
        let mut count = mutex.lock().await;
        *count += 1;
    }

    pub async fn get(&self) -> u32 {
        let mutex = self.mutex().await;
        let count = mutex.lock().await;
        *count
    }
}

static LOGS_ENABLED: OnceCell<()> = OnceCell::const_new();

pub async fn enable_logs() {
    LOGS_ENABLED
        .get_or_init(|| async {
            // Log level set to debug except for sqlx set at warn (to not show all sql requests)
            let filter = EnvFilter::try_new("debug,sqlx=warn").unwrap();
            tracing_subscriber::fmt().with_env_filter(filter).init();
        })
        .await;
}

/// Matcher returning a score the test picked, after an optional delay.
pub struct FakeMatcher {
    score: Mutex<f32>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeMatcher {
    pub fn new() -> Self {
        FakeMatcher {
            score: Mutex::new(0.5),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_score(&self, score: f32) {
        *self.score.lock().unwrap() = score;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchAnalyzer for FakeMatcher {
    async fn analyze(
        &self,
        _listing: &JobListing,
        _profile: &CandidateProfile,
    ) -> Result<MatchReport, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let score = *self.score.lock().unwrap();
        Ok(MatchReport {
            score,
            reasons: vec!["Skills overlap with the posting".into()],
            concerns: vec![],
            recommendation: MatchRecommendation::Review,
        })
    }
}

/// Job board returning a fixed set of listings, or failing on demand.
pub struct FakeJobBoard {
    listings: Mutex<Vec<JobListing>>,
    fail: AtomicBool,
    searches: AtomicUsize,
}

impl FakeJobBoard {
    pub fn new() -> Self {
        FakeJobBoard {
            listings: Mutex::new(vec![]),
            fail: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn set_listings(&self, listings: Vec<JobListing>) {
        *self.listings.lock().unwrap() = listings;
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBoardClient for FakeJobBoard {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<JobListing>, ServiceError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("job board is down".into()));
        }
        Ok(self.listings.lock().unwrap().clone())
    }
}

/// A listing as the fake domain stores it.
pub struct SavedListing {
    pub user_id: Uuid,
    pub listing: JobListing,
    pub created_at: DateTime<Utc>,
}

/// Mutable state behind [`FakeDomain`], exposed so tests can seed rows
/// and assert on what handlers wrote.
#[derive(Default)]
pub struct DomainState {
    pub settings: HashMap<Uuid, ScanSettings>,
    pub auto_scan_users: Vec<Uuid>,
    pub profiles: HashMap<Uuid, CandidateProfile>,
    pub listings: HashMap<Uuid, SavedListing>,
    pub scores: Vec<(Uuid, Uuid, MatchReport)>,
    pub applications: Vec<(Uuid, Uuid)>,
    pub reviews: Vec<(Uuid, Uuid, MatchReport)>,
    pub expired_reviews: u64,
    pub expired_notifications: u64,
}

/// In-memory stand-in for the application's own tables.
#[derive(Default)]
pub struct FakeDomain {
    pub state: Mutex<DomainState>,
}

#[async_trait]
impl DomainStore for FakeDomain {
    async fn scan_settings(&self, user_id: Uuid) -> Result<Option<ScanSettings>, ServiceError> {
        Ok(self.state.lock().unwrap().settings.get(&user_id).cloned())
    }

    async fn users_with_auto_scan(&self) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self.state.lock().unwrap().auto_scan_users.clone())
    }

    async fn profile(&self, user_id: Uuid) -> Result<CandidateProfile, ServiceError> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Profile for user '{user_id}'")))
    }

    async fn listing(&self, listing_id: Uuid) -> Result<JobListing, ServiceError> {
        self.state
            .lock()
            .unwrap()
            .listings
            .get(&listing_id)
            .map(|saved| saved.listing.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Listing '{listing_id}'")))
    }

    async fn listing_exists(
        &self,
        user_id: Uuid,
        external_id: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self.state.lock().unwrap().listings.values().any(|saved| {
            saved.user_id == user_id && saved.listing.external_id == external_id
        }))
    }

    async fn save_listing(
        &self,
        user_id: Uuid,
        listing: &JobListing,
    ) -> Result<Uuid, ServiceError> {
        let listing_id = Uuid::new_v4();
        self.state.lock().unwrap().listings.insert(
            listing_id,
            SavedListing {
                user_id,
                listing: listing.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(listing_id)
    }

    async fn record_score(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        report: &MatchReport,
    ) -> Result<(), ServiceError> {
        self.state
            .lock()
            .unwrap()
            .scores
            .push((listing_id, user_id, report.clone()));
        Ok(())
    }

    async fn create_application(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.state
            .lock()
            .unwrap()
            .applications
            .push((user_id, listing_id));
        Ok(())
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
        report: &MatchReport,
    ) -> Result<(), ServiceError> {
        self.state
            .lock()
            .unwrap()
            .reviews
            .push((user_id, listing_id, report.clone()));
        Ok(())
    }

    async fn mark_scanned(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(settings) = state.settings.get_mut(&user_id) {
            settings.last_scanned_at = Some(at);
        }
        Ok(())
    }

    async fn delete_expired_reviews(&self, _now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let removed = state.expired_reviews;
        state.expired_reviews = 0;
        Ok(removed)
    }

    async fn delete_expired_notifications(
        &self,
        _now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let removed = state.expired_notifications;
        state.expired_notifications = 0;
        Ok(removed)
    }

    async fn delete_old_listings(&self, cutoff: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let before = state.listings.len();
        state.listings.retain(|_, saved| saved.created_at >= cutoff);
        Ok((before - state.listings.len()) as u64)
    }
}

/// Everything a queue test needs in one place: an in-memory store, fake
/// services and direct handles to both for seeding and assertions.
pub struct TestWorld {
    pub store: Arc<MemoryJobStore>,
    pub matcher: Arc<FakeMatcher>,
    pub job_board: Arc<FakeJobBoard>,
    pub backup_board: Arc<FakeJobBoard>,
    pub domain: Arc<FakeDomain>,
}

impl TestWorld {
    pub fn new() -> Self {
        TestWorld {
            store: Arc::new(MemoryJobStore::new()),
            matcher: Arc::new(FakeMatcher::new()),
            job_board: Arc::new(FakeJobBoard::new()),
            backup_board: Arc::new(FakeJobBoard::new()),
            domain: Arc::new(FakeDomain::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            matcher: self.matcher.clone(),
            job_board: self.job_board.clone(),
            backup_board: Some(self.backup_board.clone()),
            domain: self.domain.clone(),
        }
    }

    /// Worker options wired to the in-memory store and the fakes, with a
    /// poll interval short enough for tests. No handlers, no schedules.
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions::default()
            .store(self.store.clone())
            .services(self.services())
            .clear_schedules()
            .concurrency(4)
            .poll_interval(Duration::from_millis(50))
    }

    /// Same as [`worker_options`](Self::worker_options), with every stock
    /// handler registered.
    pub fn stock_options(&self) -> WorkerOptions {
        register_default_tasks(self.worker_options())
    }

    /// Seed settings and a profile for a fresh user, returning their id.
    pub fn add_user(&self, settings: ScanSettings) -> Uuid {
        let user_id = Uuid::new_v4();
        let mut state = self.domain.state.lock().unwrap();
        if settings.auto_scan_enabled {
            state.auto_scan_users.push(user_id);
        }
        state.profiles.insert(
            user_id,
            CandidateProfile {
                user_id,
                summary: "Backend engineer, eight years of Rust and SQL".into(),
                skills: vec!["rust".into(), "postgresql".into()],
            },
        );
        state.settings.insert(user_id, settings);
        user_id
    }

    /// Seed a saved listing for a user, returning its id.
    pub fn add_listing(&self, user_id: Uuid, listing: JobListing) -> Uuid {
        let listing_id = Uuid::new_v4();
        self.domain.state.lock().unwrap().listings.insert(
            listing_id,
            SavedListing {
                user_id,
                listing,
                created_at: Utc::now(),
            },
        );
        listing_id
    }
}

pub fn scan_settings() -> ScanSettings {
    ScanSettings {
        keywords: vec!["rust".into(), "backend".into()],
        location: Some("Berlin".into()),
        excluded_employers: vec![],
        excluded_keywords: vec![],
        auto_apply_enabled: false,
        auto_apply_threshold: 0.9,
        review_threshold: 0.7,
        auto_scan_enabled: false,
        scan_interval_minutes: 60,
        last_scanned_at: None,
    }
}

pub fn board_listing(external_id: &str) -> JobListing {
    JobListing {
        external_id: external_id.into(),
        title: format!("Rust Engineer {external_id}"),
        company: "Globex".into(),
        location: Some("Berlin".into()),
        url: Some(format!("https://jobs.example.com/{external_id}")),
        description: "Own the queueing and scheduling infrastructure".into(),
        posted_at: None,
    }
}
