use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::TaskContext;
use crate::handler::{IntoTaskResult, TaskError, TaskHandler};
use crate::job_options::JobOptions;
use crate::services::{JobListing, ScanSettings, SearchQuery, Services};
use crate::task::TaskKind;
use crate::tasks::analyze::AnalyzeJobMatch;
use crate::tasks::service_error;

/// Pause between two users in an automated batch, courtesy towards the
/// external job boards.
const INTER_USER_DELAY: Duration = Duration::from_secs(2);

/// Scan one user's configured search against the external job boards.
///
/// New listings are saved and one [`AnalyzeJobMatch`] job is enqueued per
/// listing. Listings the user already has, and listings matching the
/// user's exclusion lists, are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserJobScan {
    pub user_id: Uuid,
}

/// What one scan did, persisted as the job result.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub fetched: usize,
    pub new_listings: usize,
    pub skipped_duplicates: usize,
    pub skipped_excluded: usize,
    pub enqueued_analyses: usize,
}

impl TaskHandler for UserJobScan {
    const KIND: TaskKind = TaskKind::UserJobScan;
    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(120));

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        scan_user(&ctx, self.user_id).await
    }
}

/// The scan body, shared with the automated batch handler.
pub(crate) async fn scan_user(
    ctx: &TaskContext,
    user_id: Uuid,
) -> Result<ScanOutcome, TaskError> {
    let services = ctx.services();

    let settings = services
        .domain
        .scan_settings(user_id)
        .await
        .map_err(service_error)?
        .ok_or_else(|| TaskError::fatal(format!("No scan settings for user '{user_id}'")))?;

    let query = SearchQuery {
        keywords: settings.keywords.clone(),
        location: settings.location.clone(),
    };
    let listings = search_with_fallback(services, &query).await?;

    let mut outcome = ScanOutcome {
        fetched: listings.len(),
        ..Default::default()
    };

    for listing in listings {
        if is_excluded(&listing, &settings) {
            outcome.skipped_excluded += 1;
            continue;
        }

        let already_saved = services
            .domain
            .listing_exists(user_id, &listing.external_id)
            .await
            .map_err(service_error)?;
        if already_saved {
            outcome.skipped_duplicates += 1;
            continue;
        }

        let listing_id = services
            .domain
            .save_listing(user_id, &listing)
            .await
            .map_err(service_error)?;
        outcome.new_listings += 1;

        // The dedup key makes a rescanned listing analyze once even if an
        // earlier scan attempt already enqueued it.
        let options = JobOptions::builder()
            .priority(TaskKind::AnalyzeJobMatch.default_priority())
            .user_id(user_id)
            .dedup_key(format!("analyze:{listing_id}"))
            .build();
        ctx.client()
            .enqueue_task(AnalyzeJobMatch { listing_id, user_id }, options)
            .await
            .map_err(|e| TaskError::retry(e.to_string()))?;
        outcome.enqueued_analyses += 1;
    }

    services
        .domain
        .mark_scanned(user_id, Utc::now())
        .await
        .map_err(service_error)?;

    info!(
        user_id = %user_id,
        fetched = outcome.fetched,
        new_listings = outcome.new_listings,
        skipped_duplicates = outcome.skipped_duplicates,
        skipped_excluded = outcome.skipped_excluded,
        "User scan finished"
    );

    Ok(outcome)
}

/// Search the primary job board, falling back to the backup board when one
/// is configured. Both failing is a retryable failure.
async fn search_with_fallback(
    services: &Services,
    query: &SearchQuery,
) -> Result<Vec<JobListing>, TaskError> {
    let primary_error = match services.job_board.search(query).await {
        Ok(listings) => return Ok(listings),
        Err(e) => e,
    };

    let Some(backup) = &services.backup_board else {
        return Err(TaskError::retry(format!(
            "Job board search failed: {primary_error}"
        )));
    };

    warn!("Primary job board failed, trying backup : {:?}", primary_error);
    backup.search(query).await.map_err(|e| {
        TaskError::retry(format!(
            "Job board search failed on primary ({primary_error}) and backup ({e})"
        ))
    })
}

/// Whether the user's exclusion lists drop this listing.
///
/// Employer names and keywords match case-insensitively on substrings, so
/// excluding "acme" also drops "Acme Corp International".
fn is_excluded(listing: &JobListing, settings: &ScanSettings) -> bool {
    let company = listing.company.to_lowercase();
    if settings
        .excluded_employers
        .iter()
        .any(|employer| company.contains(&employer.to_lowercase()))
    {
        return true;
    }

    let text = format!("{} {}", listing.title, listing.description).to_lowercase();
    settings
        .excluded_keywords
        .iter()
        .any(|keyword| text.contains(&keyword.to_lowercase()))
}

/// Recurring scan over every user with automatic scanning enabled.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedJobScan {}

/// Aggregate outcome of one automated batch.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchScanOutcome {
    pub scanned: usize,
    /// Users whose last scan is still within their configured interval
    pub skipped_recent: usize,
    pub new_listings: usize,
    /// One entry per user whose scan failed, the batch itself went on
    pub failed: Vec<String>,
}

impl TaskHandler for AutomatedJobScan {
    const KIND: TaskKind = TaskKind::AutomatedJobScan;

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        run_batch_scan(&ctx).await
    }
}

async fn run_batch_scan(ctx: &TaskContext) -> Result<BatchScanOutcome, TaskError> {
    let services = ctx.services();
    let users = services
        .domain
        .users_with_auto_scan()
        .await
        .map_err(service_error)?;

    let mut outcome = BatchScanOutcome::default();
    let mut ran_one = false;

    for user_id in users {
        let settings = match services.domain.scan_settings(user_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                outcome.failed.push(format!("{user_id}: no scan settings"));
                continue;
            }
            Err(e) => {
                warn!(user_id = %user_id, "Could not load scan settings : {:?}", e);
                outcome.failed.push(format!("{user_id}: {e}"));
                continue;
            }
        };

        if !scan_is_due(&settings, Utc::now()) {
            outcome.skipped_recent += 1;
            continue;
        }

        if ran_one {
            tokio::time::sleep(INTER_USER_DELAY).await;
        }
        ran_one = true;

        match scan_user(ctx, user_id).await {
            Ok(scan) => {
                outcome.scanned += 1;
                outcome.new_listings += scan.new_listings;
            }
            Err(e) => {
                warn!(user_id = %user_id, "Automated scan failed for user : {:?}", e);
                outcome.failed.push(format!("{user_id}: {e}"));
            }
        }
    }

    info!(
        scanned = outcome.scanned,
        skipped_recent = outcome.skipped_recent,
        new_listings = outcome.new_listings,
        failed = outcome.failed.len(),
        "Automated scan finished"
    );

    Ok(outcome)
}

/// A user is due when they have never been scanned, or their last scan is
/// older than their configured interval.
fn scan_is_due(settings: &ScanSettings, now: DateTime<Utc>) -> bool {
    match settings.last_scanned_at {
        None => true,
        Some(last) => {
            last + chrono::Duration::minutes(settings.scan_interval_minutes as i64) <= now
        }
    }
}
