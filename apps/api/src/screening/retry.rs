//! Bounded retry with exponential backoff around a `TextGenerator`.
//!
//! The loop is an explicit state machine:
//! `Attempting(1) → … → Attempting(max) → Exhausted`, leaving early on `Success`.
//! A failed attempt `n` that is not the last waits `base_delay × 2^(n-1)`.

use std::time::Duration;

use tracing::{info, warn};

use crate::llm_client::{GenerationConfig, LlmError, TextGenerator};
use crate::screening::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt `attempt` (1-indexed), or `None` if it was the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

enum AttemptState {
    Attempting(u32),
    Success(String),
    Exhausted { attempts: u32, last: LlmError },
}

/// Calls the model until it answers or the policy is used up. The text is
/// returned unvalidated; output from failed attempts is discarded.
pub async fn invoke_model(
    generator: &dyn TextGenerator,
    prompt: &str,
    config: &GenerationConfig,
    policy: &RetryPolicy,
) -> Result<String, ModelError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut state = AttemptState::Attempting(1);

    loop {
        state = match state {
            AttemptState::Attempting(attempt) => {
                info!(
                    "Screening with {} (attempt {}/{})",
                    generator.model(),
                    attempt,
                    max_attempts
                );
                match generator.generate(prompt, config).await {
                    Ok(text) => AttemptState::Success(text),
                    Err(e) => {
                        warn!("Model attempt {attempt} failed: {e}");
                        match policy.delay_after(attempt).filter(|_| attempt < max_attempts) {
                            Some(delay) => {
                                warn!("Waiting {}ms before retrying...", delay.as_millis());
                                tokio::time::sleep(delay).await;
                                AttemptState::Attempting(attempt + 1)
                            }
                            None => AttemptState::Exhausted {
                                attempts: attempt,
                                last: e,
                            },
                        }
                    }
                }
            }
            AttemptState::Success(text) => return Ok(text),
            AttemptState::Exhausted { attempts, last } => {
                return Err(ModelError { attempts, last })
            }
        };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted `TextGenerator`: pops one reply per call, failing once the
    /// script runs out.
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, u16>>>,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<&str, u16>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn always_failing() -> Self {
            Self::new(vec![])
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Ok(text)) => Ok(text),
                Some(Err(status)) => Err(LlmError::Api {
                    status,
                    message: "scripted failure".to_string(),
                }),
                None => Err(LlmError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_doubles_and_stops_after_last_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(2000),
        };
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(4000)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(8000)));
        assert_eq!(policy.delay_after(4), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_model_is_called_three_times_with_6s_backoff() {
        let generator = ScriptedGenerator::always_failing();
        let start = tokio::time::Instant::now();

        let err = invoke_model(
            &generator,
            "prompt",
            &GenerationConfig::default(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(generator.calls(), 3);
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last, LlmError::Api { status: 503, .. }));
        assert!(
            elapsed >= Duration::from_millis(6000) && elapsed < Duration::from_millis(6100),
            "elapsed {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failure() {
        let generator = ScriptedGenerator::new(vec![Err(429), Ok("{\"overallScore\": 70}")]);
        let start = tokio::time::Instant::now();

        let text = invoke_model(
            &generator,
            "prompt",
            &GenerationConfig::default(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(text, "{\"overallScore\": 70}");
        assert_eq!(generator.calls(), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2000) && elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_does_not_wait() {
        let generator = ScriptedGenerator::new(vec![Ok("anything")]);
        let start = tokio::time::Instant::now();

        invoke_model(
            &generator,
            "prompt",
            &GenerationConfig::default(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(generator.calls(), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempt_policy_still_tries_once() {
        let generator = ScriptedGenerator::always_failing();
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::from_millis(10),
        };
        let err = invoke_model(&generator, "p", &GenerationConfig::default(), &policy)
            .await
            .unwrap_err();
        assert_eq!(generator.calls(), 1);
        assert_eq!(err.attempts, 1);
    }
}
