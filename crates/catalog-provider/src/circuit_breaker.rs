//! Circuit Breaker pattern implementation.
//!
//! 장애가 지속되는 제공자 호출을 일정 시간 차단하여 연쇄 실패를 방지합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Closed ──[연속 실패 임계치 도달]──> Open
//!    ↑                                 │
//!    │                      [reset_timeout 경과 후 다음 호출]
//!    │                                 ↓
//!    └────────[시험 호출 성공]──── HalfOpen ──[실패 / half_open_timeout 초과]──> Open
//! ```
//!
//! # 동시성 규칙
//!
//! 키마다 독립된 [`CircuitBreaker`]가 자체 잠금을 가지며, 실패 카운트를 공유하지 않습니다.
//! [`CircuitBreakerRegistry`]의 맵 잠금은 브레이커 생성 시에만 쓰기로 잡힙니다.
//! 상태 변경 알림은 상태 잠금을 해제한 뒤 전달되므로 관찰자가 전이에 영향을 주지 않습니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use catalog_core::AggregatorSettings;

/// Circuit Breaker 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 정상 상태 - 모든 요청 허용
    Closed,
    /// 장애 상태 - 모든 요청 즉시 거부
    Open,
    /// 복구 테스트 상태 - 단일 시험 호출만 허용
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit Breaker 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Open 전이를 위한 연속 실패 횟수
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// 마지막 실패 후 Open 유지 시간 (밀리초)
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// HalfOpen 시험 호출 제한 시간 (밀리초)
    #[serde(default = "default_half_open_timeout_ms")]
    pub half_open_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_reset_timeout_ms() -> u64 {
    60_000
}
fn default_half_open_timeout_ms() -> u64 {
    30_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            half_open_timeout_ms: default_half_open_timeout_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// 새 설정 생성.
    pub fn new(failure_threshold: u32, reset_timeout: Duration, half_open_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout_ms: reset_timeout.as_millis() as u64,
            half_open_timeout_ms: half_open_timeout.as_millis() as u64,
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn half_open_timeout(&self) -> Duration {
        Duration::from_millis(self.half_open_timeout_ms)
    }
}

impl From<&AggregatorSettings> for CircuitBreakerConfig {
    fn from(settings: &AggregatorSettings) -> Self {
        Self {
            failure_threshold: settings.circuit_failure_threshold.max(1),
            reset_timeout_ms: settings.circuit_reset_timeout,
            half_open_timeout_ms: settings.circuit_half_open_timeout,
        }
    }
}

/// Circuit Breaker가 직접 만들어내는 에러.
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError {
    /// Circuit이 열려 있어 호출하지 않음
    #[error("Circuit breaker '{name}' is open")]
    Open {
        name: String,
        /// 다음 시험 호출까지 남은 시간 (예상)
        retry_after: Option<Duration>,
    },
    /// HalfOpen 시험 호출이 제한 시간 내에 끝나지 않음
    #[error("Circuit breaker '{name}' trial call timed out after {timeout:?}")]
    HalfOpenTimeout { name: String, timeout: Duration },
}

/// 상태 변경 알림.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitStateChange {
    /// 브레이커 키 (제공자 이름)
    pub key: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub timestamp: DateTime<Utc>,
}

/// 상태 변경 관찰자.
///
/// 알림 전달 실패는 브레이커 상태에 영향을 주지 않아야 합니다.
pub trait CircuitObserver: Send + Sync {
    fn on_state_change(&self, change: &CircuitStateChange);
}

/// Circuit Breaker 내부 상태.
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_state_change: Instant,
    /// 진행 중인 HalfOpen 시험 호출의 시작 시각
    trial_started: Option<Instant>,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
            last_success_at: None,
            last_state_change: Instant::now(),
            trial_started: None,
        }
    }
}

/// 호출 허용 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Closed: 그대로 통과
    Pass,
    /// HalfOpen: 제한 시간이 걸린 단일 시험 호출
    Trial,
}

/// 단일 키에 대한 Circuit Breaker.
pub struct CircuitBreaker {
    /// 키 (로깅 및 알림용)
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitBreakerState>,
    observer: Option<Arc<dyn CircuitObserver>>,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    open_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl CircuitBreaker {
    /// 새 Circuit Breaker 생성.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitBreakerState::new()),
            observer: None,
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            open_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    /// 기본 설정으로 생성.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// 상태 변경 관찰자 등록.
    pub fn with_observer(mut self, observer: Arc<dyn CircuitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// 현재 상태 반환.
    ///
    /// Open 상태에서 reset_timeout이 지났으면 HalfOpen으로 전이한 결과를 반환합니다.
    pub fn state(&self) -> CircuitState {
        let (state, change) = {
            let mut state = self.lock();
            let change = self.maybe_transition_from_open(&mut state);
            (state.state, change)
        };
        self.notify(change);
        state
    }

    /// 보호된 호출 실행.
    ///
    /// Open 상태면 `operation`을 호출하지 않고 [`CircuitBreakerError::Open`]을 반환합니다.
    /// 결과가 에러이면 종류와 관계없이 실패 한 번으로 기록합니다.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitBreakerError>,
    {
        let admission = self.acquire().map_err(E::from)?;

        let result = match admission {
            Admission::Pass => operation().await,
            Admission::Trial => {
                let timeout = self.config.half_open_timeout();
                match tokio::time::timeout(timeout, operation()).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            circuit_breaker = %self.name,
                            timeout_ms = timeout.as_millis() as u64,
                            "Circuit breaker trial call timed out"
                        );
                        Err(E::from(CircuitBreakerError::HalfOpenTimeout {
                            name: self.name.clone(),
                            timeout,
                        }))
                    }
                }
            }
        };

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// 성공 기록.
    ///
    /// 실패 카운트를 초기화하고, Closed가 아니면 Closed로 전이합니다.
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);

        let change = {
            let mut state = self.lock();
            state.trial_started = None;
            state.failure_count = 0;
            state.last_success_at = Some(Utc::now());

            if state.state != CircuitState::Closed {
                tracing::info!(
                    circuit_breaker = %self.name,
                    from = %state.state,
                    "Circuit breaker recovered: -> Closed"
                );
                self.transition_to(&mut state, CircuitState::Closed)
            } else {
                None
            }
        };
        self.notify(change);
    }

    /// 실패 기록.
    ///
    /// Closed에서 임계치에 도달하거나 HalfOpen 시험 호출이 실패하면 Open으로 전이합니다.
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let change = {
            let mut state = self.lock();
            state.trial_started = None;
            state.failure_count = state.failure_count.saturating_add(1);
            state.last_failure = Some(Instant::now());
            state.last_failure_at = Some(Utc::now());

            match state.state {
                CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                    tracing::warn!(
                        circuit_breaker = %self.name,
                        failure_count = state.failure_count,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker tripped: Closed -> Open"
                    );
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    self.transition_to(&mut state, CircuitState::Open)
                }
                CircuitState::HalfOpen => {
                    tracing::warn!(
                        circuit_breaker = %self.name,
                        "Circuit breaker recovery failed: HalfOpen -> Open"
                    );
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    self.transition_to(&mut state, CircuitState::Open)
                }
                _ => None,
            }
        };
        self.notify(change);
    }

    /// 수동으로 Circuit 리셋.
    pub fn reset(&self) {
        let change = {
            let mut state = self.lock();
            state.failure_count = 0;
            state.trial_started = None;
            self.transition_to(&mut state, CircuitState::Closed)
        };
        tracing::info!(circuit_breaker = %self.name, "Circuit breaker manually reset");
        self.notify(change);
    }

    /// 메트릭 반환.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            last_failure_at: state.last_failure_at,
            last_success_at: state.last_success_at,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            open_count: self.open_count.load(Ordering::Relaxed),
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            time_in_current_state: state.last_state_change.elapsed(),
        }
    }

    /// 호출 허용 여부 결정.
    fn acquire(&self) -> Result<Admission, CircuitBreakerError> {
        let (admission, change) = {
            let mut state = self.lock();
            let mut change = self.maybe_transition_from_open(&mut state);

            // 응답 없이 버려진 시험 호출은 실패로 간주
            if state.state == CircuitState::HalfOpen {
                if let Some(started) = state.trial_started {
                    if started.elapsed() >= self.config.half_open_timeout() {
                        state.trial_started = None;
                        state.failure_count = state.failure_count.saturating_add(1);
                        state.last_failure = Some(Instant::now());
                        state.last_failure_at = Some(Utc::now());
                        self.open_count.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            circuit_breaker = %self.name,
                            "Circuit breaker trial abandoned: HalfOpen -> Open"
                        );
                        change = self.transition_to(&mut state, CircuitState::Open).or(change);
                    }
                }
            }

            let admission = match state.state {
                CircuitState::Closed => Ok(Admission::Pass),
                CircuitState::HalfOpen if state.trial_started.is_none() => {
                    state.trial_started = Some(Instant::now());
                    Ok(Admission::Trial)
                }
                CircuitState::HalfOpen => Err(CircuitBreakerError::Open {
                    name: self.name.clone(),
                    retry_after: None,
                }),
                CircuitState::Open => {
                    let retry_after = state.last_failure.map(|at| {
                        self.config
                            .reset_timeout()
                            .saturating_sub(at.elapsed())
                    });
                    Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                        retry_after,
                    })
                }
            };
            (admission, change)
        };

        if admission.is_err() {
            self.rejected_count.fetch_add(1, Ordering::Relaxed);
        }
        self.notify(change);
        admission
    }

    /// Open 상태에서 마지막 실패 후 reset_timeout이 지났으면 HalfOpen으로 전이.
    fn maybe_transition_from_open(
        &self,
        state: &mut CircuitBreakerState,
    ) -> Option<CircuitStateChange> {
        if state.state != CircuitState::Open {
            return None;
        }
        let since = state.last_failure.unwrap_or(state.last_state_change);
        if since.elapsed() < self.config.reset_timeout() {
            return None;
        }

        tracing::info!(
            circuit_breaker = %self.name,
            "Circuit breaker timeout: Open -> HalfOpen"
        );
        state.trial_started = None;
        self.transition_to(state, CircuitState::HalfOpen)
    }

    /// 상태 전이. 실제로 상태가 바뀐 경우에만 알림을 만듭니다.
    fn transition_to(
        &self,
        state: &mut CircuitBreakerState,
        new_state: CircuitState,
    ) -> Option<CircuitStateChange> {
        let previous = state.state;
        if previous == new_state {
            return None;
        }

        state.state = new_state;
        state.last_state_change = Instant::now();

        Some(CircuitStateChange {
            key: self.name.clone(),
            from: previous,
            to: new_state,
            timestamp: Utc::now(),
        })
    }

    fn notify(&self, change: Option<CircuitStateChange>) {
        if let (Some(change), Some(observer)) = (change, &self.observer) {
            observer.on_state_change(&change);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Circuit Breaker 메트릭.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    /// 현재 연속 실패 횟수
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Open 전이 횟수
    pub open_count: u64,
    /// 호출 없이 거부된 횟수
    pub rejected_count: u64,
    #[serde(skip)]
    pub time_in_current_state: Duration,
}

/// 키별 Circuit Breaker 레지스트리.
///
/// 제공자마다 독립된 브레이커를 처음 사용할 때 생성합니다.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    observer: Option<Arc<dyn CircuitObserver>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
            observer: None,
        }
    }

    /// 이후 생성되는 모든 브레이커에 관찰자 등록.
    pub fn with_observer(mut self, observer: Arc<dyn CircuitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 키에 해당하는 브레이커 반환 (없으면 생성).
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self
            .breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().unwrap_or_else(|e| e.into_inner());
        let breaker = breakers.entry(key.to_string()).or_insert_with(|| {
            let mut breaker = CircuitBreaker::new(key, self.config.clone());
            if let Some(observer) = &self.observer {
                breaker = breaker.with_observer(Arc::clone(observer));
            }
            Arc::new(breaker)
        });
        Arc::clone(breaker)
    }

    /// 키별 보호된 호출 실행.
    pub async fn execute<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitBreakerError>,
    {
        self.breaker(key).execute(operation).await
    }

    /// 키의 현재 상태 (처음 보는 키는 Closed).
    pub fn state(&self, key: &str) -> CircuitState {
        let breaker = self
            .breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        breaker
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// 키의 메트릭.
    pub fn metrics(&self, key: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|b| b.metrics())
    }

    /// 모든 브레이커의 메트릭 (이름순).
    pub fn all_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        let mut metrics: Vec<_> = self
            .breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|b| b.metrics())
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }

    /// 키의 브레이커를 Closed로 리셋.
    pub fn reset(&self, key: &str) {
        let breaker = self
            .breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        if let Some(breaker) = breaker {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::AtomicUsize;

    fn config(threshold: u32, reset_secs: u64, half_open_secs: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(
            threshold,
            Duration::from_secs(reset_secs),
            Duration::from_secs(half_open_secs),
        )
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), ProviderError> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProviderError::Upstream {
                status: 503,
                message: "unavailable".into(),
            })
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicUsize) -> Result<u32, ProviderError> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(42)
        })
        .await
    }

    #[derive(Default)]
    struct RecordingObserver {
        changes: Mutex<Vec<CircuitStateChange>>,
    }

    impl CircuitObserver for RecordingObserver {
        fn on_state_change(&self, change: &CircuitStateChange) {
            self.changes.lock().unwrap().push(change.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_stops_calling() {
        let cb = CircuitBreaker::new("p1", config(3, 60, 30));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            assert!(fail(&cb, &calls).await.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        assert!(fail(&cb, &calls).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Open: 호출하지 않고 거부
        let err = succeed(&cb, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cb.metrics().rejected_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("p1", config(3, 60, 30));
        let calls = AtomicUsize::new(0);

        fail(&cb, &calls).await.ok();
        fail(&cb, &calls).await.ok();
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.metrics().failure_count, 0);

        fail(&cb, &calls).await.ok();
        fail(&cb, &calls).await.ok();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_reset_timeout() {
        let cb = CircuitBreaker::new("p1", config(1, 60, 30));
        let calls = AtomicUsize::new(0);

        fail(&cb, &calls).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(succeed(&cb, &calls).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(succeed(&cb, &calls).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_count, 0);
        assert!(metrics.last_success_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_window() {
        let cb = CircuitBreaker::new("p1", config(1, 60, 30));
        let calls = AtomicUsize::new(0);

        fail(&cb, &calls).await.ok();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        fail(&cb, &calls).await.ok();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // 새 reset_timeout 윈도우가 시작됨
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_timeout_counts_as_failure() {
        let cb = CircuitBreaker::new("p1", config(1, 60, 30));
        let calls = AtomicUsize::new(0);

        fail(&cb, &calls).await.ok();
        tokio::time::advance(Duration::from_secs(60)).await;

        let result: Result<(), ProviderError> = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::Circuit(CircuitBreakerError::HalfOpenTimeout { .. }))
        ));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_single_trial() {
        let cb = Arc::new(CircuitBreaker::new("p1", config(1, 60, 30)));
        let calls = Arc::new(AtomicUsize::new(0));

        fail(&cb, &calls).await.ok();
        tokio::time::advance(Duration::from_secs(60)).await;

        let trial = {
            let cb = Arc::clone(&cb);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cb.execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, ProviderError>(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        // 시험 호출 진행 중에는 다른 호출 거부
        let err = succeed(&cb, &calls).await.unwrap_err();
        assert!(err.is_circuit_open());

        trial.await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_receives_transitions() {
        let observer = Arc::new(RecordingObserver::default());
        let cb = CircuitBreaker::new("p1", config(1, 10, 5)).with_observer(observer.clone());
        let calls = AtomicUsize::new(0);

        fail(&cb, &calls).await.ok();
        tokio::time::advance(Duration::from_secs(10)).await;
        succeed(&cb, &calls).await.unwrap();

        let changes = observer.changes.lock().unwrap();
        let transitions: Vec<_> = changes.iter().map(|c| (c.from, c.to)).collect();
        assert_eq!(
            transitions,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
        assert!(changes.iter().all(|c| c.key == "p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_keys_are_independent() {
        let registry = CircuitBreakerRegistry::new(config(2, 60, 30));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Result<(), ProviderError> = registry
                .execute("p1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Timeout("ETIMEDOUT".into()))
                })
                .await;
        }

        assert_eq!(registry.state("p1"), CircuitState::Open);
        assert_eq!(registry.state("p2"), CircuitState::Closed);

        let ok: Result<u8, ProviderError> = registry.execute("p2", || async { Ok(1) }).await;
        assert_eq!(ok.unwrap(), 1);

        let names: Vec<_> = registry.all_metrics().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(registry.metrics("p1").unwrap().failure_count, 2);

        registry.reset("p1");
        assert_eq!(registry.state("p1"), CircuitState::Closed);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AggregatorSettings {
            circuit_failure_threshold: 7,
            circuit_reset_timeout: 1_500,
            circuit_half_open_timeout: 700,
            ..Default::default()
        };
        let config = CircuitBreakerConfig::from(&settings);
        assert_eq!(config.failure_threshold, 7);
        assert_eq!(config.reset_timeout(), Duration::from_millis(1_500));
        assert_eq!(config.half_open_timeout(), Duration::from_millis(700));
    }
}
