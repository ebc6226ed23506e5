//! Background interest recalculation.

use crate::config::InterestJobConfig;
use crate::services::BillingService;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Run interest recalculation for the configured societies every interval.
/// Returns `None` when the job is not configured.
pub fn spawn_interest_job(service: Arc<BillingService>, config: InterestJobConfig) -> Option<JoinHandle<()>> {
    if !config.is_enabled() {
        tracing::info!("Interest recalculation job disabled");
        return None;
    }

    tracing::info!(
        societies = config.societies.len(),
        interval_secs = config.interval.as_secs(),
        "Starting interest recalculation job"
    );
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            for society_id in &config.societies {
                refresh_society(service.clone(), society_id.clone()).await;
            }
        }
    }))
}

/// One society's refresh, isolated on its own task so a panic is reported
/// and the schedule carries on. Returns whether the run succeeded.
pub(crate) async fn refresh_society(service: Arc<BillingService>, society_id: String) -> bool {
    let run = tokio::spawn({
        let society_id = society_id.clone();
        async move { service.recalculate_interest(&society_id, Utc::now()).await }
    });
    match run.await {
        Ok(Ok(report)) => {
            tracing::info!(
                society_id = %society_id,
                examined = report.examined,
                updated = report.updated,
                skipped = report.skipped,
                "Interest recalculation finished"
            );
            true
        }
        Ok(Err(e)) => {
            tracing::error!(society_id = %society_id, error = %e, "Interest recalculation failed");
            false
        }
        Err(e) => {
            tracing::error!(society_id = %society_id, error = %e, "Interest recalculation task aborted");
            false
        }
    }
}
