//! Call governor: paces outbound model calls to a minimum start-to-start
//! interval and retries transient failures with exponential backoff.
//!
//! Time is injected through [`Clock`] so the retry/pacing schedule is
//! testable without real sleeps.

use peerscout_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    /// Minimum spacing between call starts.
    pub min_interval: Duration,
    /// Base backoff delay, doubled per attempt.
    pub base_delay: Duration,
    /// Total attempts per call, including the first.
    pub max_retries: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(25),
            base_delay: Duration::from_secs(20),
            max_retries: 5,
        }
    }
}

impl GovernorConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_interval: Duration::from_secs(env_u64(
                "PEERSCOUT_MIN_CALL_INTERVAL_S",
                d.min_interval.as_secs(),
            )),
            base_delay: Duration::from_secs(env_u64(
                "PEERSCOUT_BASE_RETRY_DELAY_S",
                d.base_delay.as_secs(),
            )),
            max_retries: env_u64("PEERSCOUT_MAX_RETRIES", d.max_retries as u64) as u32,
        }
    }
}

/// Monotonic time source plus sleeping, as one injectable seam.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Offset from an arbitrary fixed origin. Monotonic.
    fn now(&self) -> Duration;
    async fn sleep(&self, d: Duration);
}

/// Real time via tokio.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: std::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

pub struct CallGovernor<C: Clock = TokioClock> {
    config: GovernorConfig,
    clock: Arc<C>,
    /// Start time of the most recent dispatched call.
    last_call_start: Mutex<Option<Duration>>,
}

impl CallGovernor<TokioClock> {
    pub fn new(config: GovernorConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock::default()))
    }
}

impl<C: Clock> CallGovernor<C> {
    pub fn with_clock(config: GovernorConfig, clock: Arc<C>) -> Self {
        Self {
            config,
            clock,
            last_call_start: Mutex::new(None),
        }
    }

    /// Wait until at least `min_interval` has passed since the previous call
    /// start, then record this call's start. The lock is held across the
    /// sleep so concurrent callers serialize their starts.
    async fn pace(&self) {
        let mut last = self.last_call_start.lock().await;
        if let Some(prev) = *last {
            let elapsed = self.clock.now().saturating_sub(prev);
            if elapsed < self.config.min_interval {
                let wait = self.config.min_interval - elapsed;
                tracing::debug!(wait_s = wait.as_secs(), "pacing before next call");
                self.clock.sleep(wait).await;
            }
        }
        *last = Some(self.clock.now());
    }

    fn backoff_delay(&self, attempt: u32, err: &Error) -> Duration {
        let exponential = self.config.base_delay * 2u32.saturating_pow(attempt);
        match err {
            // A provider wait hint wins; otherwise rate limits get an extra
            // margin on top of the exponential delay.
            Error::RateLimited {
                retry_after_s: Some(s),
                ..
            } => Duration::from_secs(*s),
            Error::RateLimited { .. } => exponential + Duration::from_secs(5),
            _ => exponential,
        }
    }

    /// Run `op` under pacing and retry. Quota exhaustion and missing
    /// configuration propagate immediately; the last attempt's error
    /// propagates once the retry budget is spent.
    pub async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            self.pace().await;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e @ (Error::QuotaExhausted(_) | Error::NotConfigured(_))) => return Err(e),
                Err(e) => {
                    if attempt + 1 >= self.config.max_retries {
                        tracing::warn!(label, attempt, error = %e, "retry budget exhausted");
                        return Err(e);
                    }
                    let delay = self.backoff_delay(attempt, &e);
                    tracing::warn!(
                        label,
                        attempt,
                        delay_s = delay.as_secs(),
                        error = %e,
                        "call failed, backing off"
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
