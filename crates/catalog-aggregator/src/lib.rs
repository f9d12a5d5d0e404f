//! 상품 카탈로그 집계 코어.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ChangeLedger: 실제로 바뀐 가격/재고만 이력에 추가
//! - StalenessClassifier: 시간 기반/부재 기반 stale 표시
//! - AggregationScheduler: 제공자 동시 조회 및 주기 관리
//! - QueryService: 카탈로그 조회
//! - EventBus: 관측 이벤트

pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod providers;
pub mod query;
pub mod scheduler;
pub mod staleness;
pub mod stats;

pub use config::SchedulerConfig;
pub use error::{AggregatorError, AggregatorResult};
pub use events::{spawn_event_logger, AggregatorEvent, EventBus, StalenessReason};
pub use ledger::ChangeLedger;
pub use providers::{build_provider, build_providers};
pub use query::QueryService;
pub use scheduler::{AggregationScheduler, RegisteredProvider, SchedulerState};
pub use staleness::{StalenessClassifier, StalenessSweep};
pub use stats::{CycleStats, ProviderCycleStats};
