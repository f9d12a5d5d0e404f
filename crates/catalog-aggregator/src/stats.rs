//! 조회 주기 통계.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 제공자 한 곳의 조회 결과.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCycleStats {
    pub provider_name: String,
    /// 조회 성공 여부
    pub fetched: bool,
    /// Circuit Open으로 호출하지 않음
    pub circuit_open: bool,
    /// 받은 상품 수
    pub products: usize,
    /// 새로 생성된 상품 수
    pub created: usize,
    /// 가격 레코드 추가 수
    pub price_changes: usize,
    /// 재고 레코드 추가 수
    pub availability_changes: usize,
    /// 저장 실패 상품 수
    pub store_errors: usize,
    /// 부재로 stale 처리된 상품 수
    pub marked_stale: usize,
    /// 실패 메시지
    pub error: Option<String>,
}

impl ProviderCycleStats {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            ..Default::default()
        }
    }
}

/// 조회 주기 한 번의 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStats {
    /// 주기 번호 (1부터)
    pub cycle: u64,
    pub providers: Vec<ProviderCycleStats>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CycleStats {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Default::default()
        }
    }

    /// 성공한 제공자 수
    pub fn succeeded(&self) -> usize {
        self.providers.iter().filter(|p| p.fetched).count()
    }

    /// 실패한 제공자 수
    pub fn failed(&self) -> usize {
        self.providers.len() - self.succeeded()
    }

    pub fn total_products(&self) -> usize {
        self.providers.iter().map(|p| p.products).sum()
    }

    /// 이력이 바뀐 상품 기준 변경 수 (생성/가격/재고)
    pub fn total_changes(&self) -> usize {
        self.providers
            .iter()
            .map(|p| p.created + p.price_changes + p.availability_changes)
            .sum()
    }

    pub fn total_store_errors(&self) -> usize {
        self.providers.iter().map(|p| p.store_errors).sum()
    }

    /// 제공자 통계 조회
    pub fn provider(&self, name: &str) -> Option<&ProviderCycleStats> {
        self.providers.iter().find(|p| p.provider_name == name)
    }

    /// 제공자 성공률 (%)
    pub fn success_rate(&self) -> f64 {
        if self.providers.is_empty() {
            0.0
        } else {
            (self.succeeded() as f64 / self.providers.len() as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            cycle = self.cycle,
            providers = self.providers.len(),
            succeeded = self.succeeded(),
            failed = self.failed(),
            products = self.total_products(),
            changes = self.total_changes(),
            store_errors = self.total_store_errors(),
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.2}s", self.elapsed.as_secs_f64()),
            "Fetch cycle finished"
        );
    }
}
