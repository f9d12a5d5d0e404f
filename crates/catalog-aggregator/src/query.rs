//! 카탈로그 조회 서비스.
//!
//! 저장소를 읽기만 하며, 스케줄러의 쓰기와 동시에 호출될 수 있습니다.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use catalog_core::{Clock, Page, Pagination, ProductChange, ProductDetail, ProductFilter, ProductSnapshot};
use catalog_store::ProductStore;

use crate::error::{AggregatorError, AggregatorResult};

/// 카탈로그 조회 서비스.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn ProductStore>,
    clock: Arc<dyn Clock>,
    /// 변경 조회 기본 윈도우
    default_window: Duration,
}

impl QueryService {
    pub fn new(store: Arc<dyn ProductStore>, clock: Arc<dyn Clock>, default_window: Duration) -> Self {
        Self {
            store,
            clock,
            default_window,
        }
    }

    /// 필터와 페이지네이션으로 상품 목록 조회.
    ///
    /// 가격/재고 조건을 포함한 모든 필터는 페이지를 자르기 전에 적용됩니다.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> AggregatorResult<Page<ProductSnapshot>> {
        Ok(self.store.find_many(filter, pagination).await?)
    }

    /// 가격/재고 전체 이력을 포함한 상품 상세.
    pub async fn get_product(&self, id: Uuid) -> AggregatorResult<ProductDetail> {
        let product = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AggregatorError::ProductNotFound(id))?;

        let price_history = self.store.price_history(id).await?;
        let availability_history = self.store.availability_history(id).await?;

        Ok(ProductDetail {
            product,
            price_history,
            availability_history,
        })
    }

    /// stale 상품 전체.
    pub async fn stale_products(&self) -> AggregatorResult<Vec<ProductSnapshot>> {
        let filter = ProductFilter {
            stale: Some(true),
            ..Default::default()
        };
        Ok(self.store.find_all(&filter).await?)
    }

    /// stale 상품 수.
    pub async fn count_stale(&self) -> AggregatorResult<usize> {
        Ok(self.store.count_stale().await?)
    }

    /// 최근 `window_minutes`분 동안의 가격/재고 변경 (최신순).
    ///
    /// `None`이면 기본 윈도우를 사용합니다.
    pub async fn changes(&self, window_minutes: Option<u64>) -> AggregatorResult<Vec<ProductChange>> {
        let window = window_minutes
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
            .unwrap_or(self.default_window);
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let mut changes = self.store.price_changes_since(cutoff).await?;
        changes.extend(self.store.availability_changes_since(cutoff).await?);
        changes.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(changes)
    }
}
