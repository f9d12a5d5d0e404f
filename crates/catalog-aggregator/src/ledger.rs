//! 변경 원장.
//!
//! 제공자 관측 하나를 상품 저장소에 반영합니다.
//! 가격/재고 이력은 값이 실제로 바뀌었을 때만 추가되고, 메타데이터와
//! `last_fetched_at`, `is_stale`은 관측마다 갱신됩니다.

use std::sync::Arc;

use tracing::trace;

use catalog_core::{AvailabilityRecord, Clock, PriceRecord, Product, ProductMutation, ProviderProduct};
use catalog_store::{ProductStore, StoreResult};

use crate::events::{AggregatorEvent, EventBus};

/// 변경 원장.
#[derive(Clone)]
pub struct ChangeLedger {
    store: Arc<dyn ProductStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl ChangeLedger {
    pub fn new(store: Arc<dyn ProductStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// 관측 하나를 기록하고 어떤 변화가 있었는지 반환합니다.
    ///
    /// - 처음 보는 상품이면 생성 후 가격/재고 레코드를 하나씩 추가합니다.
    /// - 이미 있는 상품이면 메타데이터를 갱신하고 stale 표시를 해제하며,
    ///   최신 레코드와 다를 때만 가격/재고 레코드를 추가합니다.
    pub async fn record_observation(
        &self,
        provider_name: &str,
        observed: &ProviderProduct,
    ) -> StoreResult<ProductMutation> {
        let now = self.clock.now();

        let existing = self
            .store
            .find_by_provider_identity(provider_name, &observed.id)
            .await?;

        let candidate = match existing.clone() {
            Some(mut product) => {
                product.refresh(observed, now);
                product
            }
            None => Product::first_seen(provider_name, observed, now),
        };
        let candidate_id = candidate.id;

        // 다른 tick이 먼저 생성했다면 저장소가 기존 행을 돌려줌
        let product = self.store.upsert_product(candidate).await?;
        let created = existing.is_none() && product.id == candidate_id;

        let mut mutation = ProductMutation {
            created,
            ..Default::default()
        };

        let latest_price = self.store.latest_price_record(product.id).await?;
        let price_differs = latest_price
            .map(|latest| !latest.same_price(observed.price, &observed.currency))
            .unwrap_or(true);
        if price_differs {
            self.store
                .append_price_record(PriceRecord {
                    product_id: product.id,
                    amount: observed.price,
                    currency: observed.currency.clone(),
                    observed_at: now,
                })
                .await?;
            mutation.price_changed = true;
        }

        let latest_availability = self.store.latest_availability_record(product.id).await?;
        let availability_differs = latest_availability
            .map(|latest| latest.is_available != observed.is_available)
            .unwrap_or(true);
        if availability_differs {
            self.store
                .append_availability_record(AvailabilityRecord {
                    product_id: product.id,
                    is_available: observed.is_available,
                    observed_at: now,
                })
                .await?;
            mutation.availability_changed = true;
        }

        trace!(
            provider = %provider_name,
            provider_id = %observed.id,
            product_id = %product.id,
            created = mutation.created,
            price_changed = mutation.price_changed,
            availability_changed = mutation.availability_changed,
            "Observation recorded"
        );

        if mutation.is_change() {
            self.events.emit(AggregatorEvent::ProductChanged {
                product_id: product.id,
                provider_name: provider_name.to_string(),
                mutation,
            });
        }

        Ok(mutation)
    }
}
