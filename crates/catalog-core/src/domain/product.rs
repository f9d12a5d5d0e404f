//! 상품 및 이력 레코드.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};

/// 제공자가 반환하는 원본 상품.
///
/// 제공자는 매 호출마다 전체 카탈로그를 반환합니다 (페이지네이션 없음).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProduct {
    /// 제공자 내부 상품 ID
    pub id: String,
    /// 상품명
    pub name: String,
    /// 설명
    #[serde(default)]
    pub description: Option<String>,
    /// 가격
    pub price: Decimal,
    /// 통화 코드 (예: "USD")
    pub currency: String,
    /// 구매 가능 여부
    pub is_available: bool,
}

impl ProviderProduct {
    /// 새 원본 상품 생성.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
        is_available: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price,
            currency: currency.into(),
            is_available,
        }
    }

    /// 설명 추가.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 필수 필드 검증.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.id.trim().is_empty() {
            return Err(CatalogError::invalid_input("product id is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CatalogError::invalid_input(format!(
                "product '{}' has an empty name",
                self.id
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(CatalogError::invalid_input(format!(
                "product '{}' has an empty currency",
                self.id
            )));
        }
        if self.price.is_sign_negative() {
            return Err(CatalogError::invalid_input(format!(
                "product '{}' has a negative price {}",
                self.id, self.price
            )));
        }
        Ok(())
    }
}

/// 정규화된 카탈로그 상품.
///
/// `(provider_name, provider_id)` 쌍이 전역 식별자이며 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 대리 키 (최초 관측 시 할당)
    pub id: Uuid,
    /// 제공자 이름
    pub provider_name: String,
    /// 제공자 내부 ID
    pub provider_id: String,
    /// 상품명
    pub name: String,
    /// 설명
    pub description: Option<String>,
    /// 이 상품을 포함한 마지막 성공 조회 시각
    pub last_fetched_at: DateTime<Utc>,
    /// stale 여부
    pub is_stale: bool,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 제공자 원본 상품에서 최초 관측된 상품 생성.
    pub fn first_seen(provider_name: &str, source: &ProviderProduct, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_name: provider_name.to_string(),
            provider_id: source.id.clone(),
            name: source.name.clone(),
            description: source.description.clone(),
            last_fetched_at: now,
            is_stale: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 새로 관측된 메타데이터 반영.
    ///
    /// staleness는 신규 데이터 도착 즉시 해제됩니다.
    pub fn refresh(&mut self, source: &ProviderProduct, now: DateTime<Utc>) {
        self.name = source.name.clone();
        self.description = source.description.clone();
        self.last_fetched_at = now;
        self.is_stale = false;
        self.updated_at = now;
    }

    /// 식별자 쌍이 일치하는지 확인.
    pub fn has_identity(&self, provider_name: &str, provider_id: &str) -> bool {
        self.provider_name == provider_name && self.provider_id == provider_id
    }
}

/// 가격 이력 레코드 (불변, 추가 전용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub observed_at: DateTime<Utc>,
}

impl PriceRecord {
    /// 같은 가격인지 비교 (금액과 통화).
    pub fn same_price(&self, amount: Decimal, currency: &str) -> bool {
        self.amount == amount && self.currency == currency
    }
}

/// 재고 이력 레코드 (불변, 추가 전용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub product_id: Uuid,
    pub is_available: bool,
    pub observed_at: DateTime<Utc>,
}

/// 최신 가격/재고가 포함된 상품 뷰.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(flatten)]
    pub product: Product,
    pub price: Option<PriceRecord>,
    pub availability: Option<AvailabilityRecord>,
}

impl ProductSnapshot {
    /// 최신 가격 금액.
    pub fn amount(&self) -> Option<Decimal> {
        self.price.as_ref().map(|p| p.amount)
    }

    /// 최신 재고 상태 (이력이 없으면 false).
    pub fn is_available(&self) -> bool {
        self.availability
            .as_ref()
            .map(|a| a.is_available)
            .unwrap_or(false)
    }
}

/// 전체 이력이 포함된 상품 상세.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    /// 가격 이력 (최신순)
    pub price_history: Vec<PriceRecord>,
    /// 재고 이력 (최신순)
    pub availability_history: Vec<AvailabilityRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_product_deserializes_camel_case() {
        let json = r#"{"id":"a","name":"Widget","price":"10.50","currency":"USD","isAvailable":true}"#;
        let product: ProviderProduct = serde_json::from_str(json).unwrap();

        assert_eq!(product.id, "a");
        assert_eq!(product.price, dec!(10.50));
        assert!(product.is_available);
        assert!(product.description.is_none());
    }

    #[test]
    fn test_provider_product_validation() {
        let ok = ProviderProduct::new("a", "Widget", dec!(10), "USD", true);
        assert!(ok.validate().is_ok());

        let empty_id = ProviderProduct::new(" ", "Widget", dec!(10), "USD", true);
        assert!(empty_id.validate().is_err());

        let negative = ProviderProduct::new("a", "Widget", dec!(-1), "USD", true);
        assert!(negative.validate().is_err());

        let no_currency = ProviderProduct::new("a", "Widget", dec!(1), "", true);
        assert!(no_currency.validate().is_err());
    }

    #[test]
    fn test_refresh_clears_staleness() {
        let now = Utc::now();
        let source = ProviderProduct::new("a", "Widget", dec!(10), "USD", true);
        let mut product = Product::first_seen("p1", &source, now);
        product.is_stale = true;

        let renamed = ProviderProduct::new("a", "Widget v2", dec!(10), "USD", true);
        let later = now + chrono::Duration::seconds(10);
        product.refresh(&renamed, later);

        assert!(!product.is_stale);
        assert_eq!(product.name, "Widget v2");
        assert_eq!(product.last_fetched_at, later);
        assert_eq!(product.created_at, now);
        assert!(product.has_identity("p1", "a"));
    }

    #[test]
    fn test_price_equality_is_numeric() {
        let record = PriceRecord {
            product_id: Uuid::new_v4(),
            amount: dec!(10.0),
            currency: "USD".into(),
            observed_at: Utc::now(),
        };
        assert!(record.same_price(dec!(10.00), "USD"));
        assert!(!record.same_price(dec!(10.00), "EUR"));
    }
}
