//! 설정으로부터 제공자 구성.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::{AggregatorSettings, ProviderKind, ProviderSettings};
use catalog_provider::{HttpProviderClient, ProviderClient, SimulatedProvider};

use crate::error::AggregatorResult;
use crate::scheduler::RegisteredProvider;

/// 설정된 제공자 하나 생성.
pub fn build_provider(settings: &ProviderSettings) -> AggregatorResult<RegisteredProvider> {
    let client: Arc<dyn ProviderClient> = match &settings.kind {
        ProviderKind::Http { url, timeout_ms } => Arc::new(HttpProviderClient::new(
            url.clone(),
            Duration::from_millis(*timeout_ms),
        )?),
        ProviderKind::Simulated {
            product_count,
            currency,
            seed,
        } => Arc::new(
            SimulatedProvider::generate(&settings.name, *product_count, currency, *seed)
                .with_drift_on_fetch(),
        ),
    };

    tracing::debug!(provider = %settings.name, kind = ?settings.kind, "Provider registered");
    Ok(RegisteredProvider::new(settings.name.clone(), client))
}

/// 설정의 모든 제공자 생성.
pub fn build_providers(settings: &AggregatorSettings) -> AggregatorResult<Vec<RegisteredProvider>> {
    settings.providers.iter().map(build_provider).collect()
}
