use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Politeness settings for page loads within one session
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the drawn delay added or removed at random
    pub jitter: f64,
    pub max_attempts: u32,
    /// Wait before retry `n` (0-based) is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(5000),
            jitter: 0.2,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Keeps a randomized minimum interval between page loads and retries
/// failed loads with exponential backoff.
pub struct NavigationPacer {
    config: PacingConfig,
    last_request: Mutex<Option<Instant>>,
}

impl NavigationPacer {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            last_request: Mutex::new(None),
        }
    }

    /// Record a page load that happened outside the pacer (the initial launch)
    pub async fn mark(&self) {
        *self.last_request.lock().await = Some(Instant::now());
    }

    /// Sleep until a freshly drawn interval has passed since the last page load.
    ///
    /// The first call without a recorded load returns at once.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let interval = self.draw_interval();
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tracing::debug!("Pacing next page load by {:?}", interval - elapsed);
                sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Run `operation` up to `max_attempts` times, backing off between failures
    pub async fn retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    let backoff = self.config.backoff_base * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "{} attempt {} failed: {}. Retrying in {:?}",
                        label,
                        attempt + 1,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{}: all {} attempts failed", label, attempts);
                    return Err(e);
                }
            }
        }
    }

    fn draw_interval(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = (self.config.max_delay.as_millis() as u64).max(min);
        let delay = min + rand::random::<u64>() % (max - min + 1);

        let jitter_range = (delay as f64 * self.config.jitter.clamp(0.0, 1.0)) as u64;
        let jittered = if jitter_range > 0 {
            let offset = (rand::random::<u64>() % (jitter_range * 2 + 1)) as i64 - jitter_range as i64;
            (delay as i64 + offset).max(0) as u64
        } else {
            delay
        };
        Duration::from_millis(jittered)
    }
}
