use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::warn;

pub trait DelayStrategy {
    // starts with zero!
    fn delay(&self, attempt: u32) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    /// fraction of the delay that is randomized, in [0, 1]
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_delay: base * 2u32.pow(max_attempts),
            jitter: 0.0,
        }
    }
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Default for ExponentialBackoff {
    /// max with 16 secs in between retries
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 4).with_jitter(0.2)
    }
}

impl DelayStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        if self.jitter == 0.0 {
            return delay;
        }
        // spread clients that failed together so they do not retry together
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=1.0);
        delay.mul_f64(factor)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Retry<S>
where
    S: DelayStrategy,
{
    strategy: S,
}

impl<S> Retry<S>
where
    S: DelayStrategy,
{
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }
    pub async fn with_max_attempts<T, E: std::fmt::Debug, Op, OpFac>(
        &self,
        future_factory: OpFac,
        max_attempts: u32,
    ) -> Result<T, E>
    where
        Op: Future<Output = Result<T, E>>,
        OpFac: Fn() -> Op,
    {
        let mut attempt = 0;
        loop {
            match future_factory().await {
                Ok(x) => return Ok(x),
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    let delay = self.strategy.delay(attempt);
                    warn!(
                        "Retrying in {}ms (attempts {}) due to error: {:?}",
                        delay.as_millis(),
                        attempt + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_capped() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), 4);
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(4), Duration::from_secs(16));
        assert_eq!(backoff.delay(40), Duration::from_secs(16));
    }

    #[test]
    fn jitter_only_shortens() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), 4).with_jitter(0.5);
        for _ in 0..100 {
            let delay = backoff.delay(2);
            assert!(delay <= Duration::from_secs(4));
            assert!(delay >= Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let retry = Retry::new(ExponentialBackoff::new(Duration::from_millis(1), 2));
        let calls = AtomicU32::new(0);
        let res: Result<(), &str> = retry
            .with_max_attempts(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                },
                2,
            )
            .await;
        assert_eq!(res, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_first_success() {
        let retry = Retry::new(ExponentialBackoff::new(Duration::from_millis(1), 2));
        let calls = AtomicU32::new(0);
        let res: Result<u32, &str> = retry
            .with_max_attempts(
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 1 {
                        Err("not yet")
                    } else {
                        Ok(n)
                    }
                },
                5,
            )
            .await;
        assert_eq!(res, Ok(1));
    }
}
