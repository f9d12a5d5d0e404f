//! 관측 이벤트 버스.
//!
//! 코어는 상태 변화를 이벤트로 내보내기만 하며, 구독자 유무와 관계없이 동작은 같습니다.
//! 구독자가 없거나 수신이 뒤처져도 발행 측은 실패하지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use catalog_core::ProductMutation;
use catalog_provider::{CircuitObserver, CircuitState, CircuitStateChange};

/// staleness 표시 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessReason {
    /// 기준 시간 동안 다시 조회되지 않음
    Aged,
    /// 제공자의 최근 조회 결과에서 빠짐
    Absent,
}

impl std::fmt::Display for StalenessReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StalenessReason::Aged => write!(f, "aged"),
            StalenessReason::Absent => write!(f, "absent"),
        }
    }
}

/// 집계기 이벤트.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AggregatorEvent {
    /// `circuit.state.changed`
    CircuitStateChanged {
        provider_key: String,
        from: CircuitState,
        state: CircuitState,
        timestamp: DateTime<Utc>,
    },
    /// `product.changed`
    ProductChanged {
        product_id: Uuid,
        provider_name: String,
        #[serde(flatten)]
        mutation: ProductMutation,
    },
    /// `staleness.swept`
    StalenessSwept {
        count: usize,
        reason: StalenessReason,
        /// 부재 스윕일 때 제공자 이름
        provider_name: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// 제공자 조회 실패 (Circuit 거부 포함)
    ProviderFailed {
        provider_name: String,
        error: String,
        circuit_open: bool,
        timestamp: DateTime<Utc>,
    },
    /// 저장소 작업 실패 (상품 단위 또는 부재 스윕)
    StoreFailed {
        provider_name: String,
        /// 실패한 상품의 제공자 내부 ID (부재 스윕이면 없음)
        provider_id: Option<String>,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl AggregatorEvent {
    /// 이벤트 이름.
    pub fn name(&self) -> &'static str {
        match self {
            AggregatorEvent::CircuitStateChanged { .. } => "circuit.state.changed",
            AggregatorEvent::ProductChanged { .. } => "product.changed",
            AggregatorEvent::StalenessSwept { .. } => "staleness.swept",
            AggregatorEvent::ProviderFailed { .. } => "provider.failed",
            AggregatorEvent::StoreFailed { .. } => "store.failed",
        }
    }
}

/// 브로드캐스트 이벤트 버스.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AggregatorEvent>,
}

impl EventBus {
    /// # Arguments
    ///
    /// * `capacity` - 브로드캐스트 채널 버퍼 크기
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 이벤트 발행. 구독자가 없으면 버려집니다.
    pub fn emit(&self, event: AggregatorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AggregatorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1_024)
    }
}

impl CircuitObserver for EventBus {
    fn on_state_change(&self, change: &CircuitStateChange) {
        self.emit(AggregatorEvent::CircuitStateChanged {
            provider_key: change.key.clone(),
            from: change.from,
            state: change.to,
            timestamp: change.timestamp,
        });
    }
}

/// 이벤트를 로그로 남기는 태스크 시작.
pub fn spawn_event_logger(bus: &EventBus, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => log_event(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        debug!("Event logger stopped");
    })
}

fn log_event(event: &AggregatorEvent) {
    match event {
        AggregatorEvent::CircuitStateChanged {
            provider_key,
            from,
            state,
            ..
        } => {
            info!(event = event.name(), provider = %provider_key, from = %from, state = %state, "Circuit state changed");
        }
        AggregatorEvent::ProductChanged {
            product_id,
            provider_name,
            mutation,
        } => {
            debug!(
                event = event.name(),
                product_id = %product_id,
                provider = %provider_name,
                created = mutation.created,
                price_changed = mutation.price_changed,
                availability_changed = mutation.availability_changed,
                "Product changed"
            );
        }
        AggregatorEvent::StalenessSwept {
            count,
            reason,
            provider_name,
            ..
        } => {
            info!(
                event = event.name(),
                count,
                reason = %reason,
                provider = provider_name.as_deref().unwrap_or("-"),
                "Staleness swept"
            );
        }
        AggregatorEvent::ProviderFailed {
            provider_name,
            error,
            circuit_open,
            ..
        } => {
            warn!(event = event.name(), provider = %provider_name, circuit_open, error = %error, "Provider fetch failed");
        }
        AggregatorEvent::StoreFailed {
            provider_name,
            provider_id,
            error,
            ..
        } => {
            warn!(
                event = event.name(),
                provider = %provider_name,
                provider_id = provider_id.as_deref().unwrap_or("-"),
                error = %error,
                "Store write failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(AggregatorEvent::StalenessSwept {
            count: 1,
            reason: StalenessReason::Aged,
            provider_name: None,
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_circuit_observer_publishes_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.on_state_change(&CircuitStateChange {
            key: "p1".into(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "circuit.state.changed");
        assert!(matches!(
            event,
            AggregatorEvent::CircuitStateChanged { state: CircuitState::Open, ref provider_key, .. } if provider_key == "p1"
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = AggregatorEvent::ProductChanged {
            product_id: Uuid::nil(),
            provider_name: "p1".into(),
            mutation: ProductMutation {
                created: true,
                price_changed: true,
                availability_changed: true,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "product_changed");
        assert_eq!(json["created"], true);
        assert_eq!(json["provider_name"], "p1");
    }
}
