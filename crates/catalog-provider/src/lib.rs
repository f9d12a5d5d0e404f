//! 제공자 클라이언트와 장애 대응 기본 요소.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ProviderClient trait: 제공자 공통 인터페이스
//! - HTTP 제공자 클라이언트와 시뮬레이션 제공자
//! - Circuit breaker: 제공자별 회로 차단기
//! - 지수 백오프 재시도

pub mod circuit_breaker;
pub mod error;
pub mod http;
pub mod retry;
pub mod simulated;
pub mod traits;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitObserver, CircuitState, CircuitStateChange,
};
pub use error::*;
pub use http::HttpProviderClient;
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryPolicy, RetryStats, Retryable};
pub use simulated::SimulatedProvider;
pub use traits::*;
