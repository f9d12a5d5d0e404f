//! 조회 필터 및 페이지네이션.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::ProductSnapshot;

/// 상품 조회 필터.
///
/// 모든 조건은 AND로 결합됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    /// 상품명 부분 일치 (대소문자 무시)
    pub name_contains: Option<String>,
    /// 제공자 이름
    pub provider_name: Option<String>,
    /// 최소 가격 (포함)
    pub min_price: Option<Decimal>,
    /// 최대 가격 (포함)
    pub max_price: Option<Decimal>,
    /// 재고 여부
    pub is_available: Option<bool>,
    /// stale 상품 포함 여부 (`stale`이 지정되면 무시)
    #[serde(default)]
    pub include_stale: bool,
    /// stale 여부 정확히 일치
    pub stale: Option<bool>,
    /// 마지막 조회 시각이 이 시각보다 이전인 상품만
    pub fetched_before: Option<DateTime<Utc>>,
}

impl ProductFilter {
    /// 모든 상품 (stale 포함).
    pub fn all() -> Self {
        Self {
            include_stale: true,
            ..Default::default()
        }
    }

    /// 특정 제공자의 fresh 상품.
    pub fn fresh_for_provider(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: Some(provider_name.into()),
            stale: Some(false),
            ..Default::default()
        }
    }

    /// 주어진 스냅샷이 필터를 만족하는지 확인.
    pub fn matches(&self, snapshot: &ProductSnapshot) -> bool {
        let product = &snapshot.product;

        match self.stale {
            Some(stale) if product.is_stale != stale => return false,
            None if !self.include_stale && product.is_stale => return false,
            _ => {}
        }

        if let Some(provider) = &self.provider_name {
            if &product.provider_name != provider {
                return false;
            }
        }

        if let Some(needle) = &self.name_contains {
            if !product
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }

        if let Some(cutoff) = self.fetched_before {
            if product.last_fetched_at >= cutoff {
                return false;
            }
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(amount) = snapshot.amount() else {
                return false;
            };
            if self.min_price.is_some_and(|min| amount < min) {
                return false;
            }
            if self.max_price.is_some_and(|max| amount > max) {
                return false;
            }
        }

        if let Some(available) = self.is_available {
            if snapshot.is_available() != available {
                return false;
            }
        }

        true
    }
}

/// 페이지 요청 (1부터 시작).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// 페이지당 최대 항목 수
    pub const MAX_LIMIT: u32 = 100;

    /// 정규화된 페이지 요청 생성.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// 건너뛸 항목 수.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// 페이지 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// 필터를 만족하는 전체 항목 수
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// 빈 페이지.
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: pagination.page,
            limit: pagination.limit,
        }
    }
}
