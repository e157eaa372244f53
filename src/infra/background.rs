use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::use_cases::{reconciliation::ReconciliationUseCases, subscription::SubscriptionUseCases};

/// Applies scheduled cancellations once their `cancel_at` has passed.
pub async fn run_cancellation_loop(subscriptions: Arc<SubscriptionUseCases>, poll_secs: u64) {
    let mut ticker = interval(Duration::from_secs(poll_secs.max(1)));

    info!(
        "Scheduled cancellation worker started (polling every {}s)",
        poll_secs
    );

    loop {
        ticker.tick().await;

        match subscriptions.apply_due_cancellations().await {
            Ok(canceled) if !canceled.is_empty() => {
                info!(count = canceled.len(), "Applied scheduled cancellations");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = ?e, "Failed to apply scheduled cancellations");
            }
        }
    }
}

pub async fn run_reconciliation_loop(reconciliation: Arc<ReconciliationUseCases>, every_secs: u64) {
    if every_secs == 0 {
        info!("Usage reconciliation disabled");
        return;
    }

    let mut ticker = interval(Duration::from_secs(every_secs));
    info!("Usage reconciliation started (every {}s)", every_secs);

    loop {
        ticker.tick().await;

        if let Err(e) = reconciliation.scan_overshoot().await {
            error!(error = ?e, "Usage reconciliation scan failed");
        }
    }
}
