//! 프로세스 내 시뮬레이션 제공자.
//!
//! 실제 외부 제공자 없이 집계 흐름을 돌려보기 위한 카탈로그입니다.
//! [`SimulatedProvider::drift`]를 호출할 때마다 임의의 상품 하나의 가격 또는 재고가 바뀔 수 있습니다.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use catalog_core::ProviderProduct;

use crate::error::ProviderResult;
use crate::traits::ProviderClient;

/// 가격 변경 확률
const PRICE_CHANGE_PROBABILITY: f64 = 0.3;
/// 재고 전환 확률
const AVAILABILITY_FLIP_PROBABILITY: f64 = 0.2;
/// 가격 변동 폭 (센트, ±5.00)
const MAX_PRICE_SWING_CENTS: i64 = 500;
/// 최저 가격 (센트, 9.99)
const PRICE_FLOOR_CENTS: i64 = 999;

struct SimulatedState {
    products: Vec<ProviderProduct>,
    rng: StdRng,
}

/// 시뮬레이션 제공자.
pub struct SimulatedProvider {
    state: Mutex<SimulatedState>,
    /// 조회할 때마다 `drift` 실행
    drift_on_fetch: bool,
}

impl SimulatedProvider {
    /// 주어진 상품 목록으로 생성.
    pub fn new(products: Vec<ProviderProduct>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(SimulatedState { products, rng }),
            drift_on_fetch: false,
        }
    }

    /// `count`개의 상품을 생성합니다 (`{prefix}-1` ... `{prefix}-{count}`).
    pub fn generate(prefix: &str, count: usize, currency: &str, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let products = (1..=count)
            .map(|i| {
                let cents = rng.gen_range(PRICE_FLOOR_CENTS..=19_999);
                ProviderProduct::new(
                    format!("{}-{}", prefix, i),
                    format!("{} product {}", prefix, i),
                    Decimal::new(cents, 2),
                    currency,
                    rng.gen_bool(0.8),
                )
                .with_description(format!("Simulated item {} from {}", i, prefix))
            })
            .collect();

        Self {
            state: Mutex::new(SimulatedState { products, rng }),
            drift_on_fetch: false,
        }
    }

    /// 조회 시마다 카탈로그를 변동시킴.
    pub fn with_drift_on_fetch(mut self) -> Self {
        self.drift_on_fetch = true;
        self
    }

    /// 임의 상품 하나의 가격/재고를 변동시킵니다.
    ///
    /// 변경된 상품 ID를 반환합니다 (변경이 없으면 `None`).
    pub fn drift(&self) -> Option<String> {
        let mut state = self.lock();
        if state.products.is_empty() {
            return None;
        }

        let SimulatedState { products, rng } = &mut *state;
        let index = rng.gen_range(0..products.len());
        let product = &mut products[index];
        let mut changed = false;

        if rng.gen_bool(PRICE_CHANGE_PROBABILITY) {
            let swing = rng.gen_range(-MAX_PRICE_SWING_CENTS..=MAX_PRICE_SWING_CENTS);
            let next = (product.price + Decimal::new(swing, 2)).max(Decimal::new(PRICE_FLOOR_CENTS, 2));
            changed |= next != product.price;
            product.price = next;
        }

        if rng.gen_bool(AVAILABILITY_FLIP_PROBABILITY) {
            product.is_available = !product.is_available;
            changed = true;
        }

        changed.then(|| product.id.clone())
    }

    /// 상품 추가 또는 교체 (ID 기준).
    pub fn insert(&self, product: ProviderProduct) {
        let mut state = self.lock();
        match state.products.iter().position(|p| p.id == product.id) {
            Some(index) => state.products[index] = product,
            None => state.products.push(product),
        }
    }

    /// 카탈로그에서 상품 제거.
    pub fn remove(&self, id: &str) -> Option<ProviderProduct> {
        let mut state = self.lock();
        let index = state.products.iter().position(|p| p.id == id)?;
        Some(state.products.remove(index))
    }

    /// 현재 카탈로그 복사본.
    pub fn products(&self) -> Vec<ProviderProduct> {
        self.lock().products.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProviderClient for SimulatedProvider {
    async fn get_products(&self) -> ProviderResult<Vec<ProviderProduct>> {
        if self.drift_on_fetch {
            self.drift();
        }
        Ok(self.products())
    }
}
