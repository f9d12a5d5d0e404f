//! 카탈로그 시스템의 공용 에러 타입.

use thiserror::Error;

/// 핵심 카탈로그 에러.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 카탈로그 작업을 위한 Result 타입.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// 설정 에러 생성.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// 입력 검증 에러 생성.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CatalogError {
    fn from(err: config::ConfigError) -> Self {
        CatalogError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogError::config("FETCH_INTERVAL must be positive");
        assert_eq!(err.to_string(), "설정 에러: FETCH_INTERVAL must be positive");

        let err = CatalogError::invalid_input("empty id");
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }
}
