//! 집계기 에러 타입.

use thiserror::Error;
use uuid::Uuid;

use catalog_core::CatalogError;
use catalog_provider::ProviderError;
use catalog_store::StoreError;

/// 집계기 에러.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// 제공자 호출 실패
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 저장소 작업 실패
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 설정/입력 오류
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// 상품 없음
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),
}

/// 집계기 작업을 위한 Result 타입.
pub type AggregatorResult<T> = Result<T, AggregatorError>;
