//! 저장소 오류 타입.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// 저장소 관련 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 식별자 중복
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// 이력 레코드가 마지막 레코드보다 과거 시각
    #[error("Out-of-order record for product {product_id}: {observed_at} is before {latest}")]
    OutOfOrder {
        product_id: Uuid,
        observed_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// 저장소 사용 불가
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// 내부 오류
    #[error("Internal store error: {0}")]
    Internal(String),
}

/// 저장소 작업을 위한 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// 상품이 없음.
    pub fn product_not_found(id: Uuid) -> Self {
        StoreError::NotFound(format!("product {}", id))
    }
}
