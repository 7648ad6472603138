//! Bounded retry with exponential backoff for provider calls.

use crate::types::{AppError, Result};
use crate::utils::toml_config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Which provider a call goes to; decides the error raised on timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Embedding,
    Synthesis,
}

impl ProviderKind {
    fn error(self, message: String) -> AppError {
        match self {
            ProviderKind::Embedding => AppError::EmbeddingProvider(message),
            ProviderKind::Synthesis => AppError::SynthesisProvider(message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with the given timeout.
    pub fn none(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            timeout,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubled each time and
    /// capped, plus up to 50% random jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        let jitter_ms = (base.as_millis() / 2) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out. Each attempt is bounded by the policy timeout.
    pub async fn run<T, F, Fut>(&self, kind: ProviderKind, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(kind.error(format!(
                    "{} timed out after {}s",
                    label,
                    self.timeout.as_secs_f32()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = &AtomicU32::new(0);
        let result = quick(3)
            .run(ProviderKind::Embedding, "embed", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::EmbeddingProvider("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let err = quick(2)
            .run(ProviderKind::Synthesis, "generate", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AppError::SynthesisProvider("down".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SynthesisProvider(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = &AtomicU32::new(0);
        let err = quick(5)
            .run(ProviderKind::Embedding, "embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AppError::Validation("bad input".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_provider_error() {
        let policy = RetryPolicy::none(Duration::from_millis(50));
        let err = policy
            .run(ProviderKind::Synthesis, "generate", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SynthesisProvider(_)));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(400),
            timeout: Duration::from_secs(1),
        };
        assert!(policy.backoff_for(1) >= Duration::from_millis(100));
        assert!(policy.backoff_for(1) <= Duration::from_millis(150));
        assert!(policy.backoff_for(8) <= Duration::from_millis(600));
    }
}
