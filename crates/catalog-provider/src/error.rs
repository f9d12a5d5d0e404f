//! 제공자 에러 타입.

use thiserror::Error;

use crate::circuit_breaker::CircuitBreakerError;

/// 에러 분류.
///
/// 재시도/Circuit Breaker 처리 방식을 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 일시적 장애 (네트워크, 타임아웃, 5xx) - 재시도 대상
    Transient,
    /// 영구적 장애 (잘못된 응답, 인증, 4xx) - 재시도하지 않음
    Permanent,
    /// Circuit Breaker가 호출 없이 거부함
    CircuitOpen,
}

/// 제공자 호출 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 연결 재설정
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// 연결 거부
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 업스트림 5xx 응답
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// 4xx 응답
    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 응답 형식 오류
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Circuit Breaker 거부/시험 호출 실패
    #[error(transparent)]
    Circuit(#[from] CircuitBreakerError),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 제공자 작업을 위한 Result 타입.
pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// 에러 분류 반환.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::NetworkError(_)
            | ProviderError::ConnectionReset(_)
            | ProviderError::ConnectionRefused(_)
            | ProviderError::Timeout(_)
            | ProviderError::Upstream { .. } => ErrorKind::Transient,
            ProviderError::Circuit(CircuitBreakerError::Open { .. }) => ErrorKind::CircuitOpen,
            ProviderError::Circuit(CircuitBreakerError::HalfOpenTimeout { .. }) => {
                ErrorKind::Transient
            }
            ProviderError::Client { .. }
            | ProviderError::Unauthorized(_)
            | ProviderError::Malformed(_)
            | ProviderError::Unknown(_) => ErrorKind::Permanent,
        }
    }

    /// 재시도 가능한 에러인지 확인.
    ///
    /// Circuit Breaker가 만든 에러는 재시도 루프 바깥에서 발생하므로 제외합니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Circuit(_)) && self.kind() == ErrorKind::Transient
    }

    /// Circuit Open으로 거부된 호출인지 확인.
    pub fn is_circuit_open(&self) -> bool {
        self.kind() == ErrorKind::CircuitOpen
    }

    /// HTTP 상태 코드로부터 에러 생성.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProviderError::Unauthorized(message),
            500..=599 => ProviderError::Upstream { status, message },
            _ => ProviderError::Client { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::ConnectionRefused(err.to_string())
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), err.to_string())
        } else if err.is_request() || err.is_body() {
            ProviderError::NetworkError(err.to_string())
        } else {
            ProviderError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

impl From<catalog_core::CatalogError> for ProviderError {
    fn from(err: catalog_core::CatalogError) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}
