use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::TaskContext;
use crate::handler::{IntoTaskResult, TaskError, TaskHandler};
use crate::task::TaskKind;
use crate::tasks::service_error;

/// Hard ceiling on one AI matcher call. Exceeding it fails the job for
/// good, an analysis that slow will not get faster on a retry.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(25);

/// Score one saved listing against its owner's profile.
///
/// The score is written back to the domain store, then the user's
/// thresholds decide what happens: auto-apply, create a review for the
/// user to look at, or just record the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeJobMatch {
    pub listing_id: Uuid,
    pub user_id: Uuid,
}

/// What the analysis concluded, persisted as the job result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub score: f32,
    pub action: AnalysisAction,
}

/// The threshold decision taken after scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisAction {
    AutoApplied,
    ReviewCreated,
    Recorded,
}

impl TaskHandler for AnalyzeJobMatch {
    const KIND: TaskKind = TaskKind::AnalyzeJobMatch;
    // Above the internal analysis ceiling so the analysis failure, with
    // its more precise message, is the one that surfaces.
    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(30));

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        analyze_listing(&ctx, self.listing_id, self.user_id).await
    }
}

pub(crate) async fn analyze_listing(
    ctx: &TaskContext,
    listing_id: Uuid,
    user_id: Uuid,
) -> Result<AnalysisOutcome, TaskError> {
    let services = ctx.services();

    let listing = services
        .domain
        .listing(listing_id)
        .await
        .map_err(service_error)?;
    let profile = services
        .domain
        .profile(user_id)
        .await
        .map_err(service_error)?;

    let analysis = tokio::time::timeout(
        ANALYSIS_TIMEOUT,
        services.matcher.analyze(&listing, &profile),
    )
    .await;
    let report = match analysis {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => return Err(service_error(e)),
        Err(_) => {
            return Err(TaskError::fatal(format!(
                "Match analysis did not finish within {}s",
                ANALYSIS_TIMEOUT.as_secs()
            )));
        }
    };

    services
        .domain
        .record_score(listing_id, user_id, &report)
        .await
        .map_err(service_error)?;

    // Without settings there is nothing to compare the score against, the
    // analysis is still recorded.
    let settings = services
        .domain
        .scan_settings(user_id)
        .await
        .map_err(service_error)?;

    let action = match settings {
        Some(settings)
            if settings.auto_apply_enabled && report.score >= settings.auto_apply_threshold =>
        {
            services
                .domain
                .create_application(user_id, listing_id)
                .await
                .map_err(service_error)?;
            AnalysisAction::AutoApplied
        }
        Some(settings) if report.score >= settings.review_threshold => {
            services
                .domain
                .create_review(user_id, listing_id, &report)
                .await
                .map_err(service_error)?;
            AnalysisAction::ReviewCreated
        }
        _ => AnalysisAction::Recorded,
    };

    info!(
        listing_id = %listing_id,
        user_id = %user_id,
        score = report.score,
        action = ?action,
        "Match analysis finished"
    );

    Ok(AnalysisOutcome {
        score: report.score,
        action,
    })
}
