//! Billing expiration sweeper.
//!
//! One in-process scheduler: a catch-up sweep 5 seconds after boot (for
//! downtime spanning an expiry), then an hourly sweep at minute 0.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::services::BillingService;

const STARTUP_DELAY: Duration = Duration::from_secs(5);
const HOURLY_AT_MINUTE_ZERO: &str = "0 0 * * * *";

pub struct Sweeper {
    billing: Arc<BillingService>,
    running: Arc<RwLock<bool>>,
}

impl Sweeper {
    #[must_use]
    pub fn new(billing: BillingService) -> Self {
        Self {
            billing: Arc::new(billing),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Starting billing expiration sweeper");

        tokio::time::sleep(STARTUP_DELAY).await;

        if !*self.running.read().await {
            return Ok(());
        }

        if let Err(e) = self.run_once().await {
            error!("Startup expiration sweep failed: {}", e);
        }

        let mut sched = JobScheduler::new().await?;

        let billing = Arc::clone(&self.billing);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(HOURLY_AT_MINUTE_ZERO, move |_uuid, _lock| {
            let billing = Arc::clone(&billing);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                match billing.sweep_expired().await {
                    Ok(0) => {}
                    Ok(disabled) => info!("Expiration sweep disabled {} account(s)", disabled),
                    Err(e) => error!("Scheduled expiration sweep failed: {}", e),
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Sweeper running hourly at minute 0");

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping sweeper...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn run_once(&self) -> Result<u64> {
        let disabled = self.billing.sweep_expired().await?;
        if disabled > 0 {
            info!("Expiration sweep disabled {} account(s)", disabled);
        }
        Ok(disabled)
    }
}
