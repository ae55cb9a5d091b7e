//! Periodic registry refresh
//!
//! Runs `refresh_registry` on a fixed interval until cancelled. The first
//! tick is skipped because the router was loaded when it was built. A failed
//! refresh is logged here; the previous registry keeps serving.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::service::IntegrationRouter;

pub struct RefreshScheduler;

impl RefreshScheduler {
    pub fn spawn(
        router: Arc<IntegrationRouter>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            info!("[Router] Registry refresh scheduled every {:?}", interval);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("[Router] Refresh scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = router.refresh_registry().await {
                            error!("[Router] Scheduled registry refresh failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}
