//! Shared fixtures for aggregator integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use catalog_aggregator::{
    AggregationScheduler, EventBus, QueryService, RegisteredProvider, SchedulerConfig,
};
use catalog_core::{
    AvailabilityRecord, Clock, ManualClock, Page, Pagination, PriceRecord, Product, ProductChange,
    ProductFilter, ProductSnapshot, ProviderProduct,
};
use catalog_provider::{
    CircuitBreakerConfig, ProviderClient, ProviderError, ProviderResult, RetryConfig,
};
use catalog_store::{InMemoryProductStore, ProductStore, StoreError, StoreResult};

/// 스크립트 응답
pub enum Outcome {
    Products(Vec<ProviderProduct>),
    Transient,
    Permanent,
}

/// 응답을 미리 지정할 수 있는 제공자.
///
/// 큐가 비어 있으면 현재 카탈로그를 반환합니다.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Outcome>>,
    catalog: Mutex<Vec<ProviderProduct>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_catalog(products: Vec<ProviderProduct>) -> Arc<Self> {
        let provider = Self::default();
        *provider.catalog.lock().unwrap() = products;
        Arc::new(provider)
    }

    pub fn set_catalog(&self, products: Vec<ProviderProduct>) {
        *self.catalog.lock().unwrap() = products;
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn push_n(&self, n: usize, make: impl Fn() -> Outcome) {
        for _ in 0..n {
            self.push(make());
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn get_products(&self) -> ProviderResult<Vec<ProviderProduct>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Products(products)) => Ok(products),
            Some(Outcome::Transient) => Err(ProviderError::ConnectionReset("ECONNRESET".into())),
            Some(Outcome::Permanent) => Err(ProviderError::Malformed("unexpected payload".into())),
            None => Ok(self.catalog.lock().unwrap().clone()),
        }
    }
}

/// 첫 호출 이후 정해진 호출부터 오래 멈추는 제공자.
pub struct HangingProvider {
    products: Vec<ProviderProduct>,
    hang_from_call: usize,
    hang: Duration,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl HangingProvider {
    pub fn new(products: Vec<ProviderProduct>, hang_from_call: usize, hang: Duration) -> Arc<Self> {
        Arc::new(Self {
            products,
            hang_from_call,
            hang,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for HangingProvider {
    async fn get_products(&self) -> ProviderResult<Vec<ProviderProduct>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.hang_from_call {
            tokio::time::sleep(self.hang).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.clone())
    }
}

/// 저장소 호출 사이에 끼어들 수 있게 멈추는 지점.
#[derive(Default)]
pub struct Pause {
    reached: Notify,
    release: Notify,
}

impl Pause {
    /// 멈춘 호출이 도달할 때까지 대기.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// 지정한 제공자 상품 ID의 upsert를 실패시키는 저장소.
///
/// `find_all` 직후 한 번 멈추게 할 수도 있습니다.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryProductStore,
    failing_ids: Mutex<HashSet<String>>,
    pause: Mutex<Option<Arc<Pause>>>,
}

impl FlakyStore {
    /// 다음 `find_all`이 결과를 읽은 뒤 `release`까지 멈추게 합니다.
    pub fn pause_next_find_all(&self) -> Arc<Pause> {
        let pause = Arc::new(Pause::default());
        *self.pause.lock().unwrap() = Some(Arc::clone(&pause));
        pause
    }

    pub fn fail_on(&self, provider_id: &str) {
        self.failing_ids.lock().unwrap().insert(provider_id.to_string());
    }

    pub fn heal(&self) {
        self.failing_ids.lock().unwrap().clear();
    }
}

#[async_trait]
impl ProductStore for FlakyStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_provider_identity(
        &self,
        provider_name: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Product>> {
        self.inner
            .find_by_provider_identity(provider_name, provider_id)
            .await
    }

    async fn upsert_product(&self, product: Product) -> StoreResult<Product> {
        if self.failing_ids.lock().unwrap().contains(&product.provider_id) {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        self.inner.upsert_product(product).await
    }

    async fn append_price_record(&self, record: PriceRecord) -> StoreResult<()> {
        self.inner.append_price_record(record).await
    }

    async fn append_availability_record(&self, record: AvailabilityRecord) -> StoreResult<()> {
        self.inner.append_availability_record(record).await
    }

    async fn latest_price_record(&self, product_id: Uuid) -> StoreResult<Option<PriceRecord>> {
        self.inner.latest_price_record(product_id).await
    }

    async fn latest_availability_record(
        &self,
        product_id: Uuid,
    ) -> StoreResult<Option<AvailabilityRecord>> {
        self.inner.latest_availability_record(product_id).await
    }

    async fn price_history(&self, product_id: Uuid) -> StoreResult<Vec<PriceRecord>> {
        self.inner.price_history(product_id).await
    }

    async fn availability_history(
        &self,
        product_id: Uuid,
    ) -> StoreResult<Vec<AvailabilityRecord>> {
        self.inner.availability_history(product_id).await
    }

    async fn mark_stale(&self, ids: &[Uuid], fetched_before: DateTime<Utc>) -> StoreResult<usize> {
        self.inner.mark_stale(ids, fetched_before).await
    }

    async fn find_all(&self, filter: &ProductFilter) -> StoreResult<Vec<ProductSnapshot>> {
        let result = self.inner.find_all(filter).await;
        let pause = self.pause.lock().unwrap().take();
        if let Some(pause) = pause {
            pause.reached.notify_one();
            pause.release.notified().await;
        }
        result
    }

    async fn find_many(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ProductSnapshot>> {
        self.inner.find_many(filter, pagination).await
    }

    async fn count(&self, filter: &ProductFilter) -> StoreResult<usize> {
        self.inner.count(filter).await
    }

    async fn count_stale(&self) -> StoreResult<usize> {
        self.inner.count_stale().await
    }

    async fn price_changes_since(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<ProductChange>> {
        self.inner.price_changes_since(cutoff).await
    }

    async fn availability_changes_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ProductChange>> {
        self.inner.availability_changes_since(cutoff).await
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn product(id: &str, price: Decimal, available: bool) -> ProviderProduct {
    ProviderProduct::new(id, format!("Product {}", id), price, "USD", available)
}

/// 빠른 재시도와 낮은 임계치를 가진 테스트 설정.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_fetch_interval(Duration::from_secs(10))
        .with_staleness(Duration::from_secs(60), Duration::from_secs(300))
        .with_retry(
            RetryConfig::new(3, Duration::from_millis(100), Duration::from_secs(1))
                .with_backoff_factor(2.0),
        )
        .with_circuit(CircuitBreakerConfig::new(
            2,
            Duration::from_secs(60),
            Duration::from_secs(30),
        ))
}

pub struct Harness {
    pub scheduler: AggregationScheduler,
    pub query: QueryService,
    pub store: Arc<dyn ProductStore>,
    pub clock: ManualClock,
    pub events: EventBus,
}

impl Harness {
    pub fn new(providers: Vec<RegisteredProvider>) -> Self {
        Self::with_store(providers, Arc::new(InMemoryProductStore::new()))
    }

    pub fn with_store(providers: Vec<RegisteredProvider>, store: Arc<dyn ProductStore>) -> Self {
        let clock = ManualClock::new(t0());
        let events = EventBus::new(256);
        let scheduler = AggregationScheduler::new(
            test_config(),
            providers,
            Arc::clone(&store),
            Arc::new(clock.clone()),
            events.clone(),
        )
        .unwrap();
        let query = QueryService::new(
            Arc::clone(&store),
            Arc::new(clock.clone()),
            Duration::from_secs(24 * 60 * 60),
        );

        Self {
            scheduler,
            query,
            store,
            clock,
            events,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn product(&self, provider: &str, id: &str) -> Product {
        self.store
            .find_by_provider_identity(provider, id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("product {}/{} not found", provider, id))
    }
}
