//! 지수 백오프 재시도.
//!
//! 재시도 가능한 에러에 한해 `max_attempts`회까지 호출합니다.
//! n번째 실패 후 대기 시간은 `min(initial_delay * backoff_factor^(n-1), max_delay)`입니다.
//! 재시도 불가능한 에러는 대기 없이 즉시 반환합니다.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use catalog_core::AggregatorSettings;

use crate::error::ProviderError;

/// 재시도 가능 여부를 판단할 수 있는 에러.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }
}

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 호출 포함)
    pub max_attempts: u32,
    /// 첫 재시도 대기 (밀리초)
    pub initial_delay_ms: u64,
    /// 최대 대기 (밀리초)
    pub max_delay_ms: u64,
    /// 지수 백오프 배수
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// 재시도 없이 한 번만 호출.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `attempt`번째 시도가 실패한 뒤의 대기 시간 (1부터 시작).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl From<&AggregatorSettings> for RetryConfig {
    fn from(settings: &AggregatorSettings) -> Self {
        Self {
            max_attempts: settings.retry_max_attempts.max(1),
            initial_delay_ms: settings.retry_initial_delay,
            max_delay_ms: settings.retry_max_delay,
            backoff_factor: settings.retry_backoff_factor,
        }
    }
}

/// 재시도 실행 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// 실제 호출 횟수
    pub attempts: u32,
    /// 백오프 대기 시간 합계
    pub total_delay: Duration,
}

/// 재시도 정책.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 재시도 가능한 에러에 대해 재시도하며 실행.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        self.execute_with_stats(operation).await.0
    }

    /// 사용자 조건으로 재시도 여부를 결정하며 실행.
    pub async fn execute_if<T, E, F, Fut, P>(&self, operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        self.run(operation, should_retry).await.0
    }

    /// 실행 결과와 함께 재시도 통계를 반환.
    pub async fn execute_with_stats<T, E, F, Fut>(&self, operation: F) -> (Result<T, E>, RetryStats)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        self.run(operation, |e: &E| e.is_retryable()).await
    }

    async fn run<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> (Result<T, E>, RetryStats)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut stats = RetryStats::default();

        loop {
            stats.attempts += 1;
            let error = match operation().await {
                Ok(value) => {
                    if stats.attempts > 1 {
                        tracing::debug!(attempts = stats.attempts, "Operation succeeded after retry");
                    }
                    return (Ok(value), stats);
                }
                Err(e) => e,
            };

            if !should_retry(&error) {
                tracing::debug!(
                    attempt = stats.attempts,
                    error = %error,
                    "Non-retryable error, giving up"
                );
                return (Err(error), stats);
            }

            if stats.attempts >= max_attempts {
                tracing::warn!(
                    attempts = stats.attempts,
                    error = %error,
                    "Retry attempts exhausted"
                );
                return (Err(error), stats);
            }

            let delay = self.config.delay_for_attempt(stats.attempts);
            tracing::debug!(
                attempt = stats.attempts,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            stats.total_delay += delay;
        }
    }
}

/// 설정으로 한 번 재시도 실행.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    RetryPolicy::new(config.clone()).execute(operation).await
}

/// 사용자 조건으로 재시도 실행.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    RetryPolicy::new(config.clone())
        .execute_if(operation, should_retry)
        .await
}
