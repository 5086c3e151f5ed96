//! Background job scheduler and job implementations.

mod pool_metrics;
mod rate_limit_sweep;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use rate_limit_sweep::RateLimitSweepJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
