//! Fixed-window attempt limiting for anonymous form traffic.
//!
//! Each `(operation, client)` pair owns one entry holding a counter and the
//! instant its window closes. Entries live behind [`RateLimitStore`] so a
//! single-process map and a shared cache can back the same limiter; a
//! multi-instance deployment needs the shared variant.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

use crate::config::RateLimitsConfig;
use crate::error::ApiError;
use crate::middleware::metrics::record_rate_limit_denial;

/// Counter state for one limited key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("Rate limit store unavailable: {0}")]
pub struct RateLimitStoreError(pub String);

/// Storage contract for limiter entries.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, RateLimitStoreError>;

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), RateLimitStoreError>;

    async fn delete(&self, key: &str) -> Result<(), RateLimitStoreError>;

    /// Removes entries whose window closed before `now`; returns how many were dropped.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, RateLimitStoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).copied())
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), RateLimitStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RateLimitStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.reset_time > now);
        Ok(before - entries.len())
    }
}

/// Public operations with their own attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedOperation {
    FormFetch,
    Submit,
    ValidateEmail,
    ResendCode,
}

impl LimitedOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitedOperation::FormFetch => "form_fetch",
            LimitedOperation::Submit => "submit",
            LimitedOperation::ValidateEmail => "validate_email",
            LimitedOperation::ResendCode => "resend_code",
        }
    }

    pub fn max_attempts(&self, config: &RateLimitsConfig) -> u32 {
        match self {
            LimitedOperation::FormFetch => config.form_fetch,
            LimitedOperation::Submit => config.submit,
            LimitedOperation::ValidateEmail => config.validate_email,
            LimitedOperation::ResendCode => config.resend_code,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { reset_time: DateTime<Utc> },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Attempt limiter over an injected store.
pub struct AttemptLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitsConfig,
}

impl AttemptLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitsConfig) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: RateLimitsConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), config)
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs as i64)
    }

    /// Counts one attempt for `identifier` at `now`.
    ///
    /// A missing or lapsed entry starts a fresh window with count 1. Inside a
    /// live window the attempt is denied once `count` reached `max_attempts`.
    pub async fn check_at(
        &self,
        identifier: &str,
        max_attempts: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, RateLimitStoreError> {
        match self.store.get(identifier).await? {
            Some(entry) if entry.reset_time > now => {
                if entry.count >= max_attempts {
                    return Ok(RateDecision::Denied {
                        reset_time: entry.reset_time,
                    });
                }
                self.store
                    .set(
                        identifier,
                        RateLimitEntry {
                            count: entry.count + 1,
                            reset_time: entry.reset_time,
                        },
                    )
                    .await?;
                Ok(RateDecision::Allowed)
            }
            _ => {
                self.store
                    .set(
                        identifier,
                        RateLimitEntry {
                            count: 1,
                            reset_time: now + window,
                        },
                    )
                    .await?;
                Ok(RateDecision::Allowed)
            }
        }
    }

    /// Gate for a public handler: counts the attempt and maps a denial to a 429.
    pub async fn require(&self, operation: LimitedOperation, client: &str) -> Result<(), ApiError> {
        let now = Utc::now();
        let key = format!("{}:{}", operation.as_str(), client);
        let max_attempts = operation.max_attempts(&self.config);

        let decision = self
            .check_at(&key, max_attempts, self.window(), now)
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

        match decision {
            RateDecision::Allowed => Ok(()),
            RateDecision::Denied { reset_time } => {
                let retry_after = (reset_time - now).num_seconds().max(1) as u64;
                warn!(
                    operation = operation.as_str(),
                    client = %client,
                    retry_after,
                    "Rate limit exceeded"
                );
                record_rate_limit_denial(operation.as_str());
                Err(ApiError::RateLimitedWithRetry {
                    message: retry_message(retry_after),
                    retry_after,
                })
            }
        }
    }

    /// Drops lapsed entries; called by the periodic sweep job.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        self.store.purge_expired(now).await
    }
}

impl std::fmt::Debug for AttemptLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLimiter")
            .field("config", &self.config)
            .finish()
    }
}

fn retry_message(retry_after_secs: u64) -> String {
    let minutes = retry_after_secs.div_ceil(60).max(1);
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!("Too many attempts. Please try again in {} {}.", minutes, unit)
}
