//! # Catalog Core
//!
//! 상품 카탈로그 집계기의 핵심 도메인 모델 및 공용 인프라를 제공합니다.
//!
//! 이 크레이트는 집계 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 상품, 가격 이력, 재고 이력 레코드
//! - 제공자(provider) 원본 상품 스냅샷
//! - 조회 필터 및 페이지네이션
//! - 시계(Clock) 추상화
//! - 설정 관리
//! - 로깅 인프라

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
