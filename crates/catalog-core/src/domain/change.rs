//! 상품 변경 결과 및 변경 이력 항목.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 단일 관측 기록 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMutation {
    /// 이 관측으로 상품이 새로 생성됨
    pub created: bool,
    /// 가격 레코드 추가됨
    pub price_changed: bool,
    /// 재고 레코드 추가됨
    pub availability_changed: bool,
}

impl ProductMutation {
    /// 이력에 변화가 있었는지 확인.
    pub fn is_change(&self) -> bool {
        self.created || self.price_changed || self.availability_changed
    }
}

/// 변경 종류와 새 값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "snake_case")]
pub enum ChangeKind {
    /// 가격 변경
    Price { amount: Decimal, currency: String },
    /// 재고 변경
    Availability { is_available: bool },
}

/// 변경 윈도우 조회 결과 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductChange {
    pub product_id: Uuid,
    pub name: String,
    pub provider_name: String,
    pub provider_id: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
}
