//! Permit-pool rate limiting for outbound calls
//!
//! The pool holds at most `capacity` permits and starts full. A background
//! task tops it back up to `capacity` once per `period`, in one step. Each
//! gated operation consumes one permit and never returns it, so the pool
//! behaves as a sliding window of N operations per period: bursts of up to N
//! go through right after a refill, later callers suspend until the next
//! period boundary.
//!
//! Shutting the pool down cancels the refill task and closes the permit
//! queue; callers suspended in [`PermitPool::acquire`] wake up with
//! [`PermitError::Closed`] instead of hanging forever.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Errors raised by the permit pool
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermitError {
    /// The pool was shut down while (or before) waiting for a permit
    #[error("permit pool closed")]
    Closed,

    /// Capacity or period is unusable
    #[error("invalid permit pool configuration: {0}")]
    InvalidConfiguration(String),

    /// The refill task needs a Tokio runtime to run on
    #[error("permit pool must be started from within a Tokio runtime")]
    NoRuntime,
}

/// Configuration for the permit pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitPoolConfig {
    /// Maximum number of permits; also the refill target
    pub capacity: usize,
    /// Time between refills
    pub period: Duration,
}

impl Default for PermitPoolConfig {
    fn default() -> Self {
        Self { capacity: 3, period: Duration::from_secs(1) }
    }
}

impl PermitPoolConfig {
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self { capacity, period }
    }

    /// Create a new configuration builder
    pub fn builder() -> PermitPoolConfigBuilder {
        PermitPoolConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PermitError> {
        if self.capacity == 0 {
            return Err(PermitError::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.capacity > Semaphore::MAX_PERMITS {
            return Err(PermitError::InvalidConfiguration(format!(
                "capacity must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.period.is_zero() {
            return Err(PermitError::InvalidConfiguration(
                "period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for PermitPoolConfig
#[derive(Debug, Default)]
pub struct PermitPoolConfigBuilder {
    config: PermitPoolConfig,
}

impl PermitPoolConfigBuilder {
    pub fn new() -> Self {
        Self { config: PermitPoolConfig::default() }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn build(self) -> Result<PermitPoolConfig, PermitError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Token-bucket gate with periodic bulk refill
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use vkrelay_common::resilience::{PermitPool, PermitPoolConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PermitPool::start(PermitPoolConfig::new(3, Duration::from_secs(1)))?;
///
/// pool.acquire().await?; // one of three calls allowed this second
/// assert_eq!(pool.available(), 2);
///
/// pool.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PermitPool {
    config: PermitPoolConfig,
    permits: Arc<Semaphore>,
    cancellation_token: CancellationToken,
    refill_task: Mutex<Option<JoinHandle<()>>>,
}

impl PermitPool {
    /// Create a full pool and spawn its refill task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero capacity or period and
    /// `NoRuntime` when called outside a Tokio runtime.
    pub fn start(config: PermitPoolConfig) -> Result<Self, PermitError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PermitError::NoRuntime)?;

        let permits = Arc::new(Semaphore::new(config.capacity));
        let cancellation_token = CancellationToken::new();

        let handle = runtime.spawn(Self::refill_loop(
            Arc::clone(&permits),
            config.capacity,
            config.period,
            cancellation_token.clone(),
        ));

        debug!(capacity = config.capacity, period = ?config.period, "permit pool started");

        Ok(Self {
            config,
            permits,
            cancellation_token,
            refill_task: Mutex::new(Some(handle)),
        })
    }

    /// Take one permit, suspending until the next refill if none is left.
    ///
    /// The permit is consumed: it comes back only through the periodic
    /// refill.
    ///
    /// # Errors
    ///
    /// Returns `PermitError::Closed` if the pool is shut down first.
    pub async fn acquire(&self) -> Result<(), PermitError> {
        let permit = self.permits.acquire().await.map_err(|_| PermitError::Closed)?;
        permit.forget();
        trace!(remaining = self.permits.available_permits(), "permit acquired");
        Ok(())
    }

    /// Take one permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Permits left until the next refill
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn config(&self) -> &PermitPoolConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Stop the refill task and release every suspended caller.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.permits.close();

        if let Some(handle) = self.refill_task.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => debug!("permit pool refill task stopped"),
                Ok(Err(err)) => warn!(error = %err, "permit pool refill task panicked"),
                Err(_) => warn!("permit pool refill task did not stop within timeout"),
            }
        }
    }

    /// Background refill loop: once per period, add back the deficit.
    async fn refill_loop(
        permits: Arc<Semaphore>,
        capacity: usize,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("permit refill loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if permits.is_closed() {
                        break;
                    }
                    let deficit = capacity.saturating_sub(permits.available_permits());
                    if deficit > 0 {
                        permits.add_permits(deficit);
                        trace!(refilled = deficit, capacity, "permit pool refilled");
                    }
                }
            }
        }
    }
}

/// Cancel the refill task if the pool is dropped without `shutdown`
impl Drop for PermitPool {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
            self.permits.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(PermitPoolConfig::builder().capacity(0).build().is_err());
        assert!(PermitPoolConfig::builder().period(Duration::ZERO).build().is_err());
        let config = PermitPoolConfig::builder()
            .capacity(5)
            .period(Duration::from_millis(200))
            .build()
            .unwrap();
        assert_eq!(config.capacity, 5);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let result = PermitPool::start(PermitPoolConfig::default());
        assert_eq!(result.unwrap_err(), PermitError::NoRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_starts_full_and_drains() {
        let pool = PermitPool::start(PermitPoolConfig::new(2, Duration::from_secs(1))).unwrap();
        assert_eq!(pool.available(), 2);

        assert!(pool.try_acquire());
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_tops_up_to_capacity_without_exceeding_it() {
        let pool = PermitPool::start(PermitPoolConfig::new(3, Duration::from_secs(1))).unwrap();
        pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 2);

        // Several periods pass; the pool never holds more than capacity
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(pool.available(), 3);

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_next_refill() {
        let pool = PermitPool::start(PermitPoolConfig::new(1, Duration::from_secs(1))).unwrap();
        let start = Instant::now();

        pool.acquire().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));

        pool.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_waiters() {
        let pool = Arc::new(PermitPool::start(PermitPoolConfig::new(1, Duration::from_secs(60))).unwrap());
        pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::task::yield_now().await;

        pool.shutdown().await;
        assert_eq!(waiter.await.unwrap(), Err(PermitError::Closed));
        assert!(pool.is_closed());

        // Idempotent
        pool.shutdown().await;
    }
}
