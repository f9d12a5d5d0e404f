//! Staleness 분류기.
//!
//! 두 가지 독립적인 스윕을 수행합니다:
//! - 시간 기반: 기준 시간 동안 다시 조회되지 않은 상품
//! - 부재 기반: 제공자의 최근 성공 조회 결과에서 빠진 상품
//!
//! 분류기는 stale 표시만 하며 해제하지 않습니다. 해제는 다음 관측 시 변경 원장이 합니다.
//!
//! 변경 원장과 동시에 실행될 수 있으므로, 후보 조회 후 표시할 때 저장소가
//! 마지막 조회 시각을 다시 확인합니다. 그 사이 관측된 상품은 fresh로 남습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use catalog_core::{Clock, ProductFilter};
use catalog_store::{ProductStore, StoreResult};

use crate::events::{AggregatorEvent, EventBus, StalenessReason};

/// 스윕 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalenessSweep {
    /// 새로 stale로 표시된 상품 수
    pub count: usize,
    pub reason: StalenessReason,
    pub timestamp: DateTime<Utc>,
}

/// Staleness 분류기.
#[derive(Clone)]
pub struct StalenessClassifier {
    store: Arc<dyn ProductStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl StalenessClassifier {
    pub fn new(store: Arc<dyn ProductStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// `now - last_fetched_at > threshold`인 fresh 상품을 stale로 표시.
    pub async fn mark_aged_stale(&self, threshold: Duration) -> StoreResult<StalenessSweep> {
        let now = self.clock.now();
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(threshold).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let filter = ProductFilter {
            stale: Some(false),
            fetched_before: Some(cutoff),
            ..Default::default()
        };
        let ids: Vec<_> = self
            .store
            .find_all(&filter)
            .await?
            .into_iter()
            .map(|s| s.product.id)
            .collect();

        let count = if ids.is_empty() {
            0
        } else {
            self.store.mark_stale(&ids, cutoff).await?
        };

        debug!(count, cutoff = %cutoff, "Aged staleness sweep finished");
        Ok(self.finish(count, StalenessReason::Aged, None, now))
    }

    /// 제공자 상품 중 `seen_provider_ids`에 없는 fresh 상품을 stale로 표시.
    ///
    /// 스윕 시작 시각 이후 관측된 상품은 제외합니다.
    pub async fn mark_absent_stale(
        &self,
        provider_name: &str,
        seen_provider_ids: &HashSet<String>,
    ) -> StoreResult<StalenessSweep> {
        let now = self.clock.now();

        let ids: Vec<_> = self
            .store
            .find_all(&ProductFilter::fresh_for_provider(provider_name))
            .await?
            .into_iter()
            .filter(|s| !seen_provider_ids.contains(&s.product.provider_id))
            .map(|s| s.product.id)
            .collect();

        let count = if ids.is_empty() {
            0
        } else {
            self.store.mark_stale(&ids, now).await?
        };

        debug!(provider = %provider_name, count, "Absent staleness sweep finished");
        Ok(self.finish(count, StalenessReason::Absent, Some(provider_name), now))
    }

    fn finish(
        &self,
        count: usize,
        reason: StalenessReason,
        provider_name: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> StalenessSweep {
        if count > 0 {
            self.events.emit(AggregatorEvent::StalenessSwept {
                count,
                reason,
                provider_name: provider_name.map(str::to_string),
                timestamp,
            });
        }
        StalenessSweep {
            count,
            reason,
            timestamp,
        }
    }
}
