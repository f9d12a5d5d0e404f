//! 집계 스케줄러.
//!
//! 두 개의 독립적인 타이머를 각각 별도 태스크로 실행합니다:
//! - 조회 주기: 등록된 모든 제공자를 동시에 조회하고 결과를 변경 원장에 반영
//! - staleness 주기: 시간 기반 stale 스윕 (조회 주기가 지연되어도 계속 실행)
//!
//! 제공자 호출은 `CircuitBreaker.execute(key, || RetryPolicy.execute(|| get_products()))` 형태로
//! 감싸므로, 재시도로 해소된 일시 장애는 Circuit 실패로 세지 않습니다.
//! 한 제공자의 실패는 같은 주기의 다른 제공자에 영향을 주지 않습니다.
//!
//! 중지 시 다음 tick만 취소하며 진행 중인 주기는 끝까지 실행됩니다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use catalog_core::{CatalogError, Clock};
use catalog_provider::{
    CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitState, ProviderClient, RetryPolicy,
};
use catalog_store::ProductStore;

use crate::config::SchedulerConfig;
use crate::error::{AggregatorError, AggregatorResult};
use crate::events::{AggregatorEvent, EventBus};
use crate::ledger::ChangeLedger;
use crate::staleness::{StalenessClassifier, StalenessSweep};
use crate::stats::{CycleStats, ProviderCycleStats};

/// 이름과 함께 등록된 제공자.
///
/// 이름은 Circuit 키이자 상품 식별자의 일부입니다.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub name: String,
    pub client: Arc<dyn ProviderClient>,
}

impl RegisteredProvider {
    pub fn new(name: impl Into<String>, client: Arc<dyn ProviderClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// 스케줄러 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// 스케줄러가 실행하는 루프 수 (조회, staleness)
const LOOP_COUNT: usize = 2;

/// 실행 중인 루프 핸들.
struct RunningLoop {
    shutdown: CancellationToken,
    fetch: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

/// 살아 있는 루프 수를 세는 가드.
///
/// 루프가 정상 종료하거나 패닉으로 중단되어 태스크가 해제될 때 감소합니다.
struct LoopGuard(Arc<AtomicUsize>);

impl LoopGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 주기 실행에 필요한 공유 구성 요소.
struct SchedulerCore {
    config: SchedulerConfig,
    providers: Vec<RegisteredProvider>,
    breakers: CircuitBreakerRegistry,
    retry: RetryPolicy,
    ledger: ChangeLedger,
    classifier: StalenessClassifier,
    clock: Arc<dyn Clock>,
    events: EventBus,
    cycles: AtomicU64,
}

/// 집계 스케줄러.
pub struct AggregationScheduler {
    core: Arc<SchedulerCore>,
    running: Mutex<Option<RunningLoop>>,
    live_loops: Arc<AtomicUsize>,
}

impl AggregationScheduler {
    /// 새 스케줄러 생성.
    ///
    /// 주기가 0이거나, 제공자 이름이 비어 있거나 중복되면 에러를 반환합니다.
    pub fn new(
        config: SchedulerConfig,
        providers: Vec<RegisteredProvider>,
        store: Arc<dyn ProductStore>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> AggregatorResult<Self> {
        config.validate()?;

        let mut names = HashSet::new();
        for provider in &providers {
            if provider.name.trim().is_empty() {
                return Err(CatalogError::config("provider name must not be empty").into());
            }
            if !names.insert(provider.name.as_str()) {
                return Err(CatalogError::config(format!(
                    "duplicate provider name '{}'",
                    provider.name
                ))
                .into());
            }
        }

        let breakers = CircuitBreakerRegistry::new(config.circuit.clone())
            .with_observer(Arc::new(events.clone()));
        // 조회 전에도 메트릭에 모든 제공자가 보이도록 미리 생성
        for provider in &providers {
            breakers.breaker(&provider.name);
        }

        let core = SchedulerCore {
            retry: RetryPolicy::new(config.retry.clone()),
            ledger: ChangeLedger::new(Arc::clone(&store), Arc::clone(&clock), events.clone()),
            classifier: StalenessClassifier::new(store, Arc::clone(&clock), events.clone()),
            config,
            providers,
            breakers,
            clock,
            events,
            cycles: AtomicU64::new(0),
        };

        Ok(Self {
            core: Arc::new(core),
            running: Mutex::new(None),
            live_loops: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 스케줄러 시작.
    ///
    /// 첫 조회 주기는 즉시 실행됩니다. 이미 실행 중이면 먼저 정상 종료한 뒤 다시 시작합니다.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            info!("Scheduler already running, restarting");
            Self::shutdown(previous).await;
        }

        let shutdown = CancellationToken::new();
        let fetch = tokio::spawn(Arc::clone(&self.core).run_fetch_loop(
            shutdown.clone(),
            LoopGuard::new(&self.live_loops),
        ));
        let sweep = tokio::spawn(Arc::clone(&self.core).run_sweep_loop(
            shutdown.clone(),
            LoopGuard::new(&self.live_loops),
        ));
        *running = Some(RunningLoop {
            shutdown,
            fetch,
            sweep,
        });

        info!(
            providers = self.core.providers.len(),
            fetch_interval_ms = self.core.config.fetch_interval.as_millis() as u64,
            sweep_interval_ms = self.core.config.staleness_sweep_interval.as_millis() as u64,
            "Scheduler started"
        );
    }

    /// 스케줄러 중지.
    ///
    /// 이후 tick을 취소하고, 진행 중인 주기가 끝날 때까지 기다립니다. 중지 상태에서 호출하면 아무것도 하지 않습니다.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            Self::shutdown(previous).await;
            info!("Scheduler stopped");
        }
    }

    async fn shutdown(running: RunningLoop) {
        running.shutdown.cancel();
        let (fetch, sweep) = tokio::join!(running.fetch, running.sweep);
        for (name, result) in [("fetch", fetch), ("sweep", sweep)] {
            if let Err(e) = result {
                error!(loop_name = name, error = %e, "Scheduler loop terminated abnormally");
            }
        }
    }

    /// 현재 상태.
    ///
    /// 두 루프가 모두 살아 있을 때만 `Running`입니다. 루프가 패닉으로 중단되면 `Stopped`를 반환합니다.
    pub fn state(&self) -> SchedulerState {
        if self.live_loops.load(Ordering::SeqCst) == LOOP_COUNT {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// 조회 주기 한 번 실행.
    pub async fn run_fetch_cycle(&self) -> CycleStats {
        self.core.run_fetch_cycle().await
    }

    /// 시간 기반 staleness 스윕 한 번 실행.
    pub async fn run_staleness_sweep(&self) -> AggregatorResult<StalenessSweep> {
        self.core.run_staleness_sweep().await
    }

    /// 제공자별 Circuit 메트릭 (이름순).
    pub fn circuit_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        self.core.breakers.all_metrics()
    }

    /// 제공자의 Circuit 상태.
    pub fn circuit_state(&self, provider_name: &str) -> CircuitState {
        self.core.breakers.state(provider_name)
    }

    /// 등록된 제공자 이름.
    pub fn provider_names(&self) -> Vec<&str> {
        self.core.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// 지금까지 실행된 조회 주기 수.
    pub fn cycles_run(&self) -> u64 {
        self.core.cycles.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }
}

impl SchedulerCore {
    /// 조회 루프. 첫 tick은 즉시 발생합니다.
    async fn run_fetch_loop(self: Arc<Self>, shutdown: CancellationToken, _guard: LoopGuard) {
        let mut ticker = interval(self.config.fetch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Fetch loop received shutdown");
                    break;
                }

                _ = ticker.tick() => {
                    let stats = self.run_fetch_cycle().await;
                    stats.log_summary();
                }
            }
        }
    }

    /// 시간 기반 staleness 루프. 첫 스윕은 한 주기 뒤에 실행됩니다.
    async fn run_sweep_loop(self: Arc<Self>, shutdown: CancellationToken, _guard: LoopGuard) {
        let period = self.config.staleness_sweep_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Sweep loop received shutdown");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_staleness_sweep().await {
                        error!(error = %e, "Aged staleness sweep failed");
                    }
                }
            }
        }
    }

    async fn run_fetch_cycle(&self) -> CycleStats {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        debug!(cycle, providers = self.providers.len(), "Fetch cycle started");

        let results = join_all(self.providers.iter().map(|provider| {
            let span = catalog_core::provider_span!("fetch_provider", provider.name, cycle);
            self.fetch_provider(provider).instrument(span)
        }))
        .await;

        CycleStats {
            cycle,
            providers: results,
            elapsed: started.elapsed(),
        }
    }

    /// 제공자 하나를 조회하고 결과를 반영합니다.
    async fn fetch_provider(&self, provider: &RegisteredProvider) -> ProviderCycleStats {
        let mut stats = ProviderCycleStats::new(&provider.name);
        let client = &provider.client;

        let result = self
            .breakers
            .execute(&provider.name, || {
                self.retry.execute(|| client.get_products())
            })
            .await;

        let products = match result {
            Ok(products) => products,
            Err(e) => {
                stats.circuit_open = e.is_circuit_open();
                stats.error = Some(e.to_string());
                if stats.circuit_open {
                    debug!(error = %e, "Provider skipped, circuit open");
                } else {
                    warn!(error = %e, "Provider fetch failed");
                }
                self.events.emit(AggregatorEvent::ProviderFailed {
                    provider_name: provider.name.clone(),
                    error: e.to_string(),
                    circuit_open: stats.circuit_open,
                    timestamp: self.clock.now(),
                });
                return stats;
            }
        };

        stats.fetched = true;
        stats.products = products.len();

        // 저장에 실패한 상품도 제공자 목록에는 있으므로 seen에 포함
        let mut seen = HashSet::with_capacity(products.len());
        for product in &products {
            seen.insert(product.id.clone());

            match self.ledger.record_observation(&provider.name, product).await {
                Ok(mutation) => {
                    stats.created += mutation.created as usize;
                    stats.price_changes += mutation.price_changed as usize;
                    stats.availability_changes += mutation.availability_changed as usize;
                }
                Err(e) => {
                    stats.store_errors += 1;
                    warn!(provider_id = %product.id, error = %e, "Failed to record observation");
                    self.events.emit(AggregatorEvent::StoreFailed {
                        provider_name: provider.name.clone(),
                        provider_id: Some(product.id.clone()),
                        error: e.to_string(),
                        timestamp: self.clock.now(),
                    });
                }
            }
        }

        match self
            .classifier
            .mark_absent_stale(&provider.name, &seen)
            .await
        {
            Ok(sweep) => stats.marked_stale = sweep.count,
            Err(e) => {
                warn!(error = %e, "Absent staleness sweep failed");
                self.events.emit(AggregatorEvent::StoreFailed {
                    provider_name: provider.name.clone(),
                    provider_id: None,
                    error: e.to_string(),
                    timestamp: self.clock.now(),
                });
            }
        }

        debug!(
            products = stats.products,
            created = stats.created,
            price_changes = stats.price_changes,
            availability_changes = stats.availability_changes,
            marked_stale = stats.marked_stale,
            "Provider processed"
        );
        stats
    }

    async fn run_staleness_sweep(&self) -> AggregatorResult<StalenessSweep> {
        let sweep = self
            .classifier
            .mark_aged_stale(self.config.staleness_threshold)
            .await
            .map_err(AggregatorError::from)?;
        if sweep.count > 0 {
            info!(count = sweep.count, "Aged products marked stale");
        }
        Ok(sweep)
    }
}
