//! 스케줄러 설정.

use std::time::Duration;

use catalog_core::{AggregatorSettings, CatalogError, CatalogResult};
use catalog_provider::{CircuitBreakerConfig, RetryConfig};

/// 스케줄러 설정.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 조회 주기
    pub fetch_interval: Duration,
    /// 시간 기반 staleness 스윕 주기
    pub staleness_sweep_interval: Duration,
    /// stale 판정 기준 시간
    pub staleness_threshold: Duration,
    pub retry: RetryConfig,
    pub circuit: CircuitBreakerConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&AggregatorSettings::default())
    }
}

impl From<&AggregatorSettings> for SchedulerConfig {
    fn from(settings: &AggregatorSettings) -> Self {
        Self {
            fetch_interval: settings.fetch_interval(),
            staleness_sweep_interval: settings.staleness_sweep_interval(),
            staleness_threshold: settings.staleness_threshold(),
            retry: RetryConfig::from(settings),
            circuit: CircuitBreakerConfig::from(settings),
        }
    }
}

impl SchedulerConfig {
    pub fn with_fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = interval;
        self
    }

    pub fn with_staleness(mut self, sweep_interval: Duration, threshold: Duration) -> Self {
        self.staleness_sweep_interval = sweep_interval;
        self.staleness_threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.circuit = circuit;
        self
    }

    /// 설정 값 검증.
    ///
    /// 주기가 0이면 타이머를 만들 수 없으므로 거부합니다.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.fetch_interval.is_zero() {
            return Err(CatalogError::config("fetch interval must be positive"));
        }
        if self.staleness_sweep_interval.is_zero() {
            return Err(CatalogError::config(
                "staleness sweep interval must be positive",
            ));
        }
        if self.staleness_threshold.is_zero() {
            return Err(CatalogError::config("staleness threshold must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = AggregatorSettings {
            fetch_interval: 2_000,
            staleness_sweep_interval: 30_000,
            staleness_threshold: 120_000,
            retry_max_attempts: 4,
            circuit_failure_threshold: 2,
            ..Default::default()
        };
        let config = SchedulerConfig::from(&settings);

        assert_eq!(config.fetch_interval, Duration::from_secs(2));
        assert_eq!(config.staleness_sweep_interval, Duration::from_secs(30));
        assert_eq!(config.staleness_threshold, Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.circuit.failure_threshold, 2);
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        assert!(SchedulerConfig::default().validate().is_ok());

        let config = SchedulerConfig::default().with_fetch_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config =
            SchedulerConfig::default().with_staleness(Duration::ZERO, Duration::from_secs(60));
        assert!(config.validate().is_err());

        let config =
            SchedulerConfig::default().with_staleness(Duration::from_secs(60), Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
