//! 변경 원장 속성 테스트.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use catalog_aggregator::{ChangeLedger, EventBus};
use catalog_core::{ManualClock, ProviderProduct};
use catalog_store::{InMemoryProductStore, ProductStore};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn observation(cents: i64, available: bool) -> ProviderProduct {
    ProviderProduct::new("sku-1", "Widget", Decimal::new(cents, 2), "USD", available)
}

/// 관측 시퀀스를 기록하고 (가격 이력 수, 재고 이력 수)를 반환.
async fn record_all(observations: &[(i64, bool)]) -> (usize, usize) {
    let store = Arc::new(InMemoryProductStore::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let ledger = ChangeLedger::new(store.clone(), Arc::new(clock.clone()), EventBus::new(16));

    for (cents, available) in observations {
        clock.advance(ChronoDuration::seconds(1));
        ledger
            .record_observation("p1", &observation(*cents, *available))
            .await
            .unwrap();
    }

    let product = store
        .find_by_provider_identity("p1", "sku-1")
        .await
        .unwrap()
        .unwrap();
    (
        store.price_history(product.id).await.unwrap().len(),
        store.availability_history(product.id).await.unwrap().len(),
    )
}

/// 연속된 값이 달라진 횟수 + 최초 1회
fn expected_records<T: PartialEq>(values: impl Iterator<Item = T>) -> usize {
    let mut count = 0;
    let mut last = None;
    for value in values {
        if last.as_ref() != Some(&value) {
            count += 1;
        }
        last = Some(value);
    }
    count
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn identical_observations_record_once(
        cents in 1i64..1_000_000,
        available in any::<bool>(),
        repeats in 1usize..20,
    ) {
        let observations = vec![(cents, available); repeats];
        let (prices, availability) = runtime().block_on(record_all(&observations));
        prop_assert_eq!(prices, 1);
        prop_assert_eq!(availability, 1);
    }

    #[test]
    fn one_differing_observation_adds_one_record(
        cents in 1i64..1_000_000,
        delta in 1i64..10_000,
        repeats in 1usize..10,
    ) {
        let mut observations = vec![(cents, true); repeats];
        observations.push((cents + delta, true));
        observations.extend(vec![(cents + delta, true); repeats]);

        let (prices, availability) = runtime().block_on(record_all(&observations));
        prop_assert_eq!(prices, 2);
        prop_assert_eq!(availability, 1);
    }

    #[test]
    fn history_counts_follow_value_transitions(
        observations in prop::collection::vec((prop::sample::select(vec![100i64, 250, 999]), any::<bool>()), 1..30),
    ) {
        let (prices, availability) = runtime().block_on(record_all(&observations));
        prop_assert_eq!(prices, expected_records(observations.iter().map(|(c, _)| *c)));
        prop_assert_eq!(availability, expected_records(observations.iter().map(|(_, a)| *a)));
    }
}
