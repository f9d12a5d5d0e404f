//! 상품 저장소 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use catalog_core::{
    AvailabilityRecord, Page, Pagination, PriceRecord, Product, ProductChange, ProductFilter,
    ProductSnapshot,
};

use crate::error::StoreResult;

/// 상품 저장소 인터페이스.
///
/// 모든 작업은 개별적으로 원자적이어야 하며, 스케줄러와 조회가 동시에 호출할 수 있습니다.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// 대리 키로 상품 조회.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// `(provider_name, provider_id)`로 상품 조회.
    async fn find_by_provider_identity(
        &self,
        provider_name: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Product>>;

    /// 식별자 기준 원자적 find-or-create.
    ///
    /// 같은 식별자의 상품이 이미 있으면 기존 `id`와 `created_at`을 유지하고
    /// 메타데이터(`name`, `description`, `last_fetched_at`, `is_stale`, `updated_at`)만 갱신합니다.
    /// 저장된 상품을 반환합니다.
    async fn upsert_product(&self, product: Product) -> StoreResult<Product>;

    /// 가격 레코드 추가.
    ///
    /// 마지막 레코드보다 이전 시각이면 `StoreError::OutOfOrder`.
    async fn append_price_record(&self, record: PriceRecord) -> StoreResult<()>;

    /// 재고 레코드 추가.
    async fn append_availability_record(&self, record: AvailabilityRecord) -> StoreResult<()>;

    /// 최신 가격 레코드.
    async fn latest_price_record(&self, product_id: Uuid) -> StoreResult<Option<PriceRecord>>;

    /// 최신 재고 레코드.
    async fn latest_availability_record(
        &self,
        product_id: Uuid,
    ) -> StoreResult<Option<AvailabilityRecord>>;

    /// 가격 이력 (최신순).
    async fn price_history(&self, product_id: Uuid) -> StoreResult<Vec<PriceRecord>>;

    /// 재고 이력 (최신순).
    async fn availability_history(&self, product_id: Uuid)
        -> StoreResult<Vec<AvailabilityRecord>>;

    /// 상품들을 stale로 표시.
    ///
    /// 마지막 조회 시각이 `fetched_before`보다 이전인 fresh 상품만 표시하며, 새로 표시된 개수를 반환합니다.
    /// 조건 확인과 표시는 한 번의 원자적 쓰기로 수행해야 합니다. 후보를 읽은 뒤 다시 관측된 상품은 표시되지 않습니다.
    async fn mark_stale(&self, ids: &[Uuid], fetched_before: DateTime<Utc>) -> StoreResult<usize>;

    /// 필터에 맞는 전체 상품 (페이지네이션 없음).
    async fn find_all(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductSnapshot>>;

    /// 필터 적용 후 페이지네이션 (최근 갱신순).
    async fn find_many(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ProductSnapshot>>;

    /// 필터에 맞는 상품 수.
    async fn count(&self, filter: &ProductFilter) -> StoreResult<usize>;

    /// stale 상품 수.
    async fn count_stale(&self) -> StoreResult<usize>;

    /// `cutoff` 이후 기록된 가격 변경 (최신순).
    async fn price_changes_since(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<ProductChange>>;

    /// `cutoff` 이후 기록된 재고 변경 (최신순).
    async fn availability_changes_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ProductChange>>;
}
