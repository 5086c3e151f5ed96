//! Purges lapsed attempt-limiter windows.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::scheduler::{Job, JobFrequency};
use crate::services::attempt_limiter::AttemptLimiter;

/// Keeps the limiter store bounded by dropping entries whose window has passed.
pub struct RateLimitSweepJob {
    limiter: Arc<AttemptLimiter>,
    interval_secs: u64,
}

impl RateLimitSweepJob {
    pub fn new(limiter: Arc<AttemptLimiter>, interval_secs: u64) -> Self {
        Self {
            limiter,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitSweepJob {
    fn name(&self) -> &'static str {
        "rate_limit_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let purged = self
            .limiter
            .purge_expired(Utc::now())
            .await
            .map_err(|e| e.to_string())?;
        if purged > 0 {
            debug!(purged, "Purged expired rate limit entries");
        }
        Ok(())
    }
}
