//! 메모리 기반 상품 저장소.
//!
//! 단일 `RwLock` 아래에 상품, 식별자 인덱스, 이력을 둡니다.
//! 식별자 인덱스가 `(provider_name, provider_id)` 유일성을 보장하므로
//! 동시에 두 번 upsert해도 상품은 하나만 생성됩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use catalog_core::{
    AvailabilityRecord, ChangeKind, Page, Pagination, PriceRecord, Product, ProductChange,
    ProductFilter, ProductSnapshot,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::ProductStore;

type Identity = (String, String);

#[derive(Default)]
struct StoreState {
    products: HashMap<Uuid, Product>,
    identities: HashMap<Identity, Uuid>,
    /// 상품별 가격 이력 (오래된 순)
    prices: HashMap<Uuid, Vec<PriceRecord>>,
    /// 상품별 재고 이력 (오래된 순)
    availability: HashMap<Uuid, Vec<AvailabilityRecord>>,
}

impl StoreState {
    fn snapshot(&self, product: &Product) -> ProductSnapshot {
        ProductSnapshot {
            product: product.clone(),
            price: self.prices.get(&product.id).and_then(|r| r.last()).cloned(),
            availability: self
                .availability
                .get(&product.id)
                .and_then(|r| r.last())
                .cloned(),
        }
    }

    /// 필터를 만족하는 스냅샷 (최근 갱신순, 같으면 ID순).
    fn matching(&self, filter: &ProductFilter) -> Vec<ProductSnapshot> {
        let mut snapshots: Vec<_> = self
            .products
            .values()
            .map(|p| self.snapshot(p))
            .filter(|s| filter.matches(s))
            .collect();
        snapshots.sort_by(|a, b| {
            b.product
                .updated_at
                .cmp(&a.product.updated_at)
                .then_with(|| a.product.id.cmp(&b.product.id))
        });
        snapshots
    }

    fn change(&self, product_id: Uuid, kind: ChangeKind, observed_at: DateTime<Utc>) -> Option<ProductChange> {
        let product = self.products.get(&product_id)?;
        Some(ProductChange {
            product_id,
            name: product.name.clone(),
            provider_name: product.provider_name.clone(),
            provider_id: product.provider_id.clone(),
            kind,
            observed_at,
        })
    }
}

/// 메모리 기반 상품 저장소.
#[derive(Default)]
pub struct InMemoryProductStore {
    state: RwLock<StoreState>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 상품 수.
    pub async fn len(&self) -> usize {
        self.state.read().await.products.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 마지막 레코드보다 과거 시각이면 거부.
fn ensure_in_order(
    product_id: Uuid,
    latest: Option<DateTime<Utc>>,
    observed_at: DateTime<Utc>,
) -> StoreResult<()> {
    match latest {
        Some(latest) if observed_at < latest => Err(StoreError::OutOfOrder {
            product_id,
            observed_at,
            latest,
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn find_by_provider_identity(
        &self,
        provider_name: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Product>> {
        let state = self.state.read().await;
        let key = (provider_name.to_string(), provider_id.to_string());
        Ok(state
            .identities
            .get(&key)
            .and_then(|id| state.products.get(id))
            .cloned())
    }

    async fn upsert_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        let key = (product.provider_name.clone(), product.provider_id.clone());

        if let Some(existing_id) = state.identities.get(&key).copied() {
            let existing = state
                .products
                .get_mut(&existing_id)
                .ok_or_else(|| StoreError::Internal(format!("dangling identity {:?}", key)))?;
            existing.name = product.name;
            existing.description = product.description;
            existing.last_fetched_at = product.last_fetched_at;
            existing.is_stale = product.is_stale;
            existing.updated_at = product.updated_at;
            return Ok(existing.clone());
        }

        if state.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product id {}", product.id)));
        }

        debug!(
            product_id = %product.id,
            provider = %product.provider_name,
            provider_id = %product.provider_id,
            "Product created"
        );
        state.identities.insert(key, product.id);
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn append_price_record(&self, record: PriceRecord) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&record.product_id) {
            return Err(StoreError::product_not_found(record.product_id));
        }

        let history = state.prices.entry(record.product_id).or_default();
        ensure_in_order(
            record.product_id,
            history.last().map(|r| r.observed_at),
            record.observed_at,
        )?;
        history.push(record);
        Ok(())
    }

    async fn append_availability_record(&self, record: AvailabilityRecord) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&record.product_id) {
            return Err(StoreError::product_not_found(record.product_id));
        }

        let history = state.availability.entry(record.product_id).or_default();
        ensure_in_order(
            record.product_id,
            history.last().map(|r| r.observed_at),
            record.observed_at,
        )?;
        history.push(record);
        Ok(())
    }

    async fn latest_price_record(&self, product_id: Uuid) -> StoreResult<Option<PriceRecord>> {
        let state = self.state.read().await;
        Ok(state.prices.get(&product_id).and_then(|r| r.last()).cloned())
    }

    async fn latest_availability_record(
        &self,
        product_id: Uuid,
    ) -> StoreResult<Option<AvailabilityRecord>> {
        let state = self.state.read().await;
        Ok(state
            .availability
            .get(&product_id)
            .and_then(|r| r.last())
            .cloned())
    }

    async fn price_history(&self, product_id: Uuid) -> StoreResult<Vec<PriceRecord>> {
        let state = self.state.read().await;
        Ok(state
            .prices
            .get(&product_id)
            .map(|r| r.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn availability_history(
        &self,
        product_id: Uuid,
    ) -> StoreResult<Vec<AvailabilityRecord>> {
        let state = self.state.read().await;
        Ok(state
            .availability
            .get(&product_id)
            .map(|r| r.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn mark_stale(&self, ids: &[Uuid], fetched_before: DateTime<Utc>) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let mut marked = 0;
        for id in ids {
            if let Some(product) = state.products.get_mut(id) {
                if !product.is_stale && product.last_fetched_at < fetched_before {
                    product.is_stale = true;
                    marked += 1;
                }
            }
        }
        Ok(marked)
    }

    async fn find_all(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductSnapshot>> {
        Ok(self.state.read().await.matching(filter))
    }

    async fn find_many(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ProductSnapshot>> {
        let pagination = Pagination::new(pagination.page, pagination.limit);
        let matching = self.state.read().await.matching(filter);
        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit as usize)
            .collect();

        Ok(Page {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    async fn count(&self, filter: &ProductFilter) -> StoreResult<usize> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| filter.matches(&state.snapshot(p)))
            .count())
    }

    async fn count_stale(&self) -> StoreResult<usize> {
        let state = self.state.read().await;
        Ok(state.products.values().filter(|p| p.is_stale).count())
    }

    async fn price_changes_since(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<ProductChange>> {
        let state = self.state.read().await;
        let mut changes: Vec<_> = state
            .prices
            .values()
            .flatten()
            .filter(|r| r.observed_at >= cutoff)
            .filter_map(|r| {
                state.change(
                    r.product_id,
                    ChangeKind::Price {
                        amount: r.amount,
                        currency: r.currency.clone(),
                    },
                    r.observed_at,
                )
            })
            .collect();
        changes.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(changes)
    }

    async fn availability_changes_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ProductChange>> {
        let state = self.state.read().await;
        let mut changes: Vec<_> = state
            .availability
            .values()
            .flatten()
            .filter(|r| r.observed_at >= cutoff)
            .filter_map(|r| {
                state.change(
                    r.product_id,
                    ChangeKind::Availability {
                        is_available: r.is_available,
                    },
                    r.observed_at,
                )
            })
            .collect();
        changes.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(changes)
    }
}
