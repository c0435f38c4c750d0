use crate::analysis::AnalysisError;
use std::time::Duration;
use tokio::time::sleep;

/// How often a failed analysis is attempted again before giving up.
/// Only network failures and timeouts qualify.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u8,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(2),
        }
    }

    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    pub fn should_retry(&self, attempt: u8, error: &AnalysisError) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        error.is_retryable()
    }

    pub fn delay_for(&self, attempt: u8) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        self.base_delay.saturating_mul(multiplier)
    }

    pub async fn wait_before_retry(&self, attempt: u8) {
        let delay = self.delay_for(attempt);
        tracing::info!(
            "Retrying analysis in {:.1}s (attempt {})",
            delay.as_secs_f32(),
            attempt + 2
        );
        sleep(delay).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
