use anyhow::{anyhow, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::auth::AuthService;
use crate::middleware::RateLimiters;
use crate::services::SubscriptionService;

const EXPIRE_SUBSCRIPTIONS_SCHEDULE: &str = "0 5 * * * *";
const AUTH_CLEANUP_SCHEDULE: &str = "0 */10 * * * *";

/// Recurring maintenance: subscription expiry and purging stale auth state
pub struct BackgroundJobService {
    scheduler: JobScheduler,
    auth_service: AuthService,
    subscription_service: SubscriptionService,
    rate_limiters: RateLimiters,
}

impl BackgroundJobService {
    pub async fn new(
        auth_service: AuthService,
        subscription_service: SubscriptionService,
        rate_limiters: RateLimiters,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler,
            auth_service,
            subscription_service,
            rate_limiters,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.add_subscription_expiry_job().await?;
        self.add_auth_cleanup_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!("Background job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Background job scheduler stopped");
        Ok(())
    }

    async fn add_subscription_expiry_job(&self) -> Result<()> {
        let subscription_service = self.subscription_service.clone();

        let job = Job::new_async(EXPIRE_SUBSCRIPTIONS_SCHEDULE, move |_uuid, _l| {
            let subscription_service = subscription_service.clone();
            Box::pin(async move {
                if let Err(e) = subscription_service.expire_overdue().await {
                    warn!("Subscription expiry job failed: {}", e);
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create subscription expiry job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add job to scheduler: {}", e))?;
        Ok(())
    }

    async fn add_auth_cleanup_job(&self) -> Result<()> {
        let auth_service = self.auth_service.clone();
        let rate_limiters = self.rate_limiters.clone();

        let job = Job::new_async(AUTH_CLEANUP_SCHEDULE, move |_uuid, _l| {
            let auth_service = auth_service.clone();
            let rate_limiters = rate_limiters.clone();
            Box::pin(async move {
                rate_limiters.cleanup_old_entries();
                if let Err(e) = auth_service.cleanup_expired().await {
                    warn!("Auth cleanup job failed: {}", e);
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create auth cleanup job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add job to scheduler: {}", e))?;
        Ok(())
    }
}
