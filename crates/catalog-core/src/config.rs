//! 설정 관리.
//!
//! 기본값 → (선택) TOML 파일 → 환경 변수 순으로 덮어씁니다.
//! 환경 변수는 접두사 없이 대문자 키(`FETCH_INTERVAL`, `RETRY_MAX_ATTEMPTS` 등)를 사용하며,
//! 시간 값은 모두 밀리초 단위입니다.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// 집계기 전체 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorSettings {
    /// 조회 주기 (밀리초)
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval: u64,
    /// stale 판정 기준 시간 (밀리초)
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold: u64,
    /// 시간 기반 staleness 스윕 주기 (밀리초)
    #[serde(default = "default_staleness_sweep_interval")]
    pub staleness_sweep_interval: u64,
    /// Circuit Open 전이 실패 임계치
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    /// Open 유지 시간 (밀리초)
    #[serde(default = "default_circuit_reset_timeout")]
    pub circuit_reset_timeout: u64,
    /// HalfOpen 시험 호출 제한 시간 (밀리초)
    #[serde(default = "default_circuit_half_open_timeout")]
    pub circuit_half_open_timeout: u64,
    /// 최대 시도 횟수
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// 첫 재시도 대기 (밀리초)
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay: u64,
    /// 최대 재시도 대기 (밀리초)
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay: u64,
    /// 지수 백오프 배수
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
    /// 변경 조회 기본 윈도우 (분)
    #[serde(default = "default_timeframe")]
    pub default_timeframe: u64,
    /// 이벤트 버스 버퍼 크기
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    /// 등록된 제공자 목록
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
}

fn default_fetch_interval() -> u64 {
    10_000
}
fn default_staleness_threshold() -> u64 {
    86_400_000
} // 24시간
fn default_staleness_sweep_interval() -> u64 {
    60_000
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_reset_timeout() -> u64 {
    60_000
}
fn default_circuit_half_open_timeout() -> u64 {
    30_000
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_initial_delay() -> u64 {
    1_000
}
fn default_retry_max_delay() -> u64 {
    10_000
}
fn default_retry_backoff_factor() -> f64 {
    2.0
}
fn default_timeframe() -> u64 {
    1_440
}
fn default_event_buffer_size() -> usize {
    1_024
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            fetch_interval: default_fetch_interval(),
            staleness_threshold: default_staleness_threshold(),
            staleness_sweep_interval: default_staleness_sweep_interval(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_reset_timeout: default_circuit_reset_timeout(),
            circuit_half_open_timeout: default_circuit_half_open_timeout(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_delay: default_retry_initial_delay(),
            retry_max_delay: default_retry_max_delay(),
            retry_backoff_factor: default_retry_backoff_factor(),
            default_timeframe: default_timeframe(),
            event_buffer_size: default_event_buffer_size(),
            providers: Vec::new(),
        }
    }
}

/// 제공자 등록 설정.
///
/// 제공자 이름은 명시적으로 지정하며 런타임 타입에서 유추하지 않습니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// 제공자 이름 (Circuit 키 및 상품 식별자의 일부)
    pub name: String,
    /// 제공자 종류
    #[serde(flatten)]
    pub kind: ProviderKind,
}

/// 제공자 종류별 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderKind {
    /// HTTP JSON 엔드포인트
    Http {
        url: String,
        #[serde(default = "default_http_timeout")]
        timeout_ms: u64,
    },
    /// 프로세스 내 시뮬레이션 제공자
    Simulated {
        #[serde(default = "default_simulated_count")]
        product_count: usize,
        #[serde(default = "default_simulated_currency")]
        currency: String,
        #[serde(default)]
        seed: Option<u64>,
    },
}

fn default_http_timeout() -> u64 {
    5_000
}
fn default_simulated_count() -> usize {
    10
}
fn default_simulated_currency() -> String {
    "USD".to_string()
}

impl AggregatorSettings {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    pub fn load(path: Option<&Path>) -> CatalogResult<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings: Self = builder
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.fetch_interval == 0 {
            return Err(CatalogError::config("FETCH_INTERVAL must be positive"));
        }
        if self.staleness_threshold == 0 {
            return Err(CatalogError::config("STALENESS_THRESHOLD must be positive"));
        }
        if self.staleness_sweep_interval == 0 {
            return Err(CatalogError::config(
                "STALENESS_SWEEP_INTERVAL must be positive",
            ));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(CatalogError::config(
                "CIRCUIT_FAILURE_THRESHOLD must be at least 1",
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(CatalogError::config("RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if self.retry_backoff_factor.is_nan() || self.retry_backoff_factor < 1.0 {
            return Err(CatalogError::config(
                "RETRY_BACKOFF_FACTOR must be at least 1",
            ));
        }
        if self.retry_max_delay < self.retry_initial_delay {
            return Err(CatalogError::config(
                "RETRY_MAX_DELAY must not be smaller than RETRY_INITIAL_DELAY",
            ));
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(CatalogError::config("provider name must not be empty"));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(CatalogError::config(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
        }

        Ok(())
    }

    /// 조회 주기.
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval)
    }

    /// stale 판정 기준 시간.
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold)
    }

    /// staleness 스윕 주기.
    pub fn staleness_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.staleness_sweep_interval)
    }

    /// 변경 조회 기본 윈도우.
    pub fn default_change_window(&self) -> Duration {
        Duration::from_secs(self.default_timeframe * 60)
    }
}
