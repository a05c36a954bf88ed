//! Interfaces to the application services task handlers call out to.
//!
//! Handlers never talk to a concrete job board, AI provider or domain table
//! directly. They go through the traits here, which keeps the queue testable
//! with in-memory fakes and lets deployments swap providers without touching
//! handler logic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by external collaborators.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Rate limited by upstream service")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// A job posting fetched from an external job board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobListing {
    /// Identifier assigned by the job board, used for duplicate detection
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// What to ask a job board for.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub location: Option<String>,
}

/// The candidate side of a match analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateProfile {
    pub user_id: Uuid,
    pub summary: String,
    pub skills: Vec<String>,
}

/// What the AI matcher suggests doing with a listing, informational only.
/// The thresholds in [`ScanSettings`] decide what actually happens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchRecommendation {
    Apply,
    Review,
    Skip,
}

/// Result of scoring one listing against one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchReport {
    /// Match quality between 0.0 and 1.0
    pub score: f32,
    pub reasons: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: MatchRecommendation,
}

/// Per-user scanning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSettings {
    pub keywords: Vec<String>,
    pub location: Option<String>,
    /// Listings from these employers are dropped during scans
    pub excluded_employers: Vec<String>,
    /// Listings mentioning these terms are dropped during scans
    pub excluded_keywords: Vec<String>,
    pub auto_apply_enabled: bool,
    /// Scores at or above this auto-apply, when auto apply is enabled
    pub auto_apply_threshold: f32,
    /// Scores at or above this create a review for the user
    pub review_threshold: f32,
    pub auto_scan_enabled: bool,
    /// Minimum minutes between two automated scans of the same user
    pub scan_interval_minutes: u32,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

/// Scores how well a listing matches a candidate profile.
#[async_trait]
pub trait MatchAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        listing: &JobListing,
        profile: &CandidateProfile,
    ) -> Result<MatchReport, ServiceError>;
}

/// Searches an external job board for listings.
#[async_trait]
pub trait JobBoardClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<JobListing>, ServiceError>;
}

/// Access to the application's own records, as far as handlers need them.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn scan_settings(&self, user_id: Uuid) -> Result<Option<ScanSettings>, ServiceError>;

    /// Users whose settings have automatic scanning enabled.
    async fn users_with_auto_scan(&self) -> Result<Vec<Uuid>, ServiceError>;

    async fn profile(&self, user_id: Uuid) -> Result<CandidateProfile, ServiceError>;

    async fn listing(&self, listing_id: Uuid) -> Result<JobListing, ServiceError>;

    /// Whether the user already has a listing with this job board identifier.
    async fn listing_exists(&self, user_id: Uuid, external_id: &str)
        -> Result<bool, ServiceError>;

    /// Save a scraped listing for a user, returning its new identifier.
    async fn save_listing(&self, user_id: Uuid, listing: &JobListing)
        -> Result<Uuid, ServiceError>;

    /// Record the match score and report for a saved listing.
    async fn record_score(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        report: &MatchReport,
    ) -> Result<(), ServiceError>;

    async fn create_application(&self, user_id: Uuid, listing_id: Uuid)
        -> Result<(), ServiceError>;

    async fn create_review(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
        report: &MatchReport,
    ) -> Result<(), ServiceError>;

    async fn mark_scanned(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError>;

    /// Delete reviews whose expiry is before `now`, returning how many went.
    async fn delete_expired_reviews(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    /// Delete notifications whose expiry is before `now`, returning how many went.
    async fn delete_expired_notifications(&self, now: DateTime<Utc>)
        -> Result<u64, ServiceError>;

    /// Delete saved listings created before `cutoff`, returning how many went.
    async fn delete_old_listings(&self, cutoff: DateTime<Utc>) -> Result<u64, ServiceError>;
}

/// Shared handles to every collaborator a handler can reach.
///
/// Cloning is cheap, all fields are reference counted.
#[derive(Clone)]
pub struct Services {
    pub matcher: Arc<dyn MatchAnalyzer>,
    pub job_board: Arc<dyn JobBoardClient>,
    /// Tried when the primary job board fails, if configured
    pub backup_board: Option<Arc<dyn JobBoardClient>>,
    pub domain: Arc<dyn DomainStore>,
}
