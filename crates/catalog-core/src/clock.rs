//! 시계 추상화.
//!
//! 변경 원장, staleness 분류기, 스케줄러가 동일한 "현재 시각"을 공유하도록
//! 모든 타임스탬프는 [`Clock`]을 통해 얻습니다.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// 현재 시각 제공자.
pub trait Clock: Send + Sync {
    /// 현재 UTC 시각.
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 조작하는 시계 (테스트 및 재현용).
///
/// 복제본은 같은 시각을 공유합니다.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계 생성.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// 시각을 지정한 값으로 설정.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// 시각을 앞으로 이동.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let other = clock.clone();

        clock.advance(Duration::seconds(30));
        assert_eq!(other.now(), start + Duration::seconds(30));

        other.set(start);
        assert_eq!(clock.now(), start);
    }
}
