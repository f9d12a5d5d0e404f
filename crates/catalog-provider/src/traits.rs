//! 제공자 trait 정의.

use async_trait::async_trait;
use catalog_core::ProviderProduct;

use crate::error::ProviderResult;

/// 단일 데이터 제공자 인터페이스.
///
/// 제공자 이름은 등록 시 명시적으로 함께 전달되며, 구현체가 스스로 밝히지 않습니다.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// 제공자의 현재 전체 카탈로그 조회.
    async fn get_products(&self) -> ProviderResult<Vec<ProviderProduct>>;
}
