//! 쿨다운 게이트
//!
//! 수락한 탐지 이후 쿨다운 동안 들어오는 모든 탐지를 버립니다.
//! 잠금 해제는 순수하게 시간 기반이며 (마감 시각을 조회 시점에 평가),
//! 제출 결과와 무관합니다. 잠긴 동안 들어온 탐지는 쿨다운을 연장하지 않습니다.

use std::time::Duration;

use metrics::counter;
use scanpost_core::event::{DetectionEvent, Event};
use scanpost_core::metrics as m;
use tokio::time::Instant;
use tracing::debug;

/// 쿨다운 게이트
#[derive(Debug)]
pub struct ScanGate {
    cooldown: Duration,
    locked_until: Option<Instant>,
    accepted: u64,
    suppressed: u64,
}

impl ScanGate {
    /// 새 게이트를 생성합니다.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            locked_until: None,
            accepted: 0,
            suppressed: 0,
        }
    }

    /// 탐지를 수락할지 결정합니다. 수락하면 쿨다운이 시작됩니다.
    pub fn accept(&mut self, event: &DetectionEvent) -> bool {
        self.accept_at(event, Instant::now())
    }

    /// 주어진 시각 기준으로 [`accept`](Self::accept)를 수행합니다.
    pub fn accept_at(&mut self, event: &DetectionEvent, now: Instant) -> bool {
        if self.is_locked_at(now) {
            self.suppressed += 1;
            counter!(m::GATE_SUPPRESSED_TOTAL).increment(1);
            debug!(
                text = %event.text,
                trace_id = %event.metadata.trace_id,
                "detection suppressed by cooldown"
            );
            return false;
        }

        self.locked_until = Some(now + self.cooldown);
        self.accepted += 1;
        counter!(m::GATE_ACCEPTED_TOTAL).increment(1);
        debug!(
            event_id = event.event_id(),
            text = %event.text,
            trace_id = %event.metadata.trace_id,
            cooldown_ms = self.cooldown.as_millis() as u64,
            "detection accepted"
        );
        true
    }

    /// 지금 잠겨 있는지 확인합니다.
    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Instant::now())
    }

    fn is_locked_at(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// 즉시 잠금을 해제합니다.
    pub fn reset(&mut self) {
        self.locked_until = None;
    }

    /// 쿨다운 길이
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 지금까지 수락한 탐지 수
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// 지금까지 버린 탐지 수
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> DetectionEvent {
        DetectionEvent::new(text)
    }

    #[test]
    fn duplicates_within_cooldown_accept_exactly_one() {
        let mut gate = ScanGate::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        let results: Vec<bool> = (0..10)
            .map(|i| gate.accept_at(&event("ABC123"), t0 + Duration::from_millis(i * 150)))
            .collect();

        assert_eq!(results.iter().filter(|accepted| **accepted).count(), 1);
        assert!(results[0]);
        assert_eq!(gate.accepted(), 1);
        assert_eq!(gate.suppressed(), 9);
    }

    #[test]
    fn different_text_is_also_suppressed() {
        let mut gate = ScanGate::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        assert!(gate.accept_at(&event("A"), t0));
        assert!(!gate.accept_at(&event("B"), t0 + Duration::from_millis(10)));
    }

    #[test]
    fn accepts_again_after_cooldown() {
        let mut gate = ScanGate::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        assert!(gate.accept_at(&event("ABC123"), t0));
        assert!(!gate.accept_at(&event("ABC123"), t0 + Duration::from_millis(1999)));
        assert!(gate.accept_at(&event("ABC123"), t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn suppressed_detections_do_not_extend_cooldown() {
        let mut gate = ScanGate::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        assert!(gate.accept_at(&event("X"), t0));
        assert!(!gate.accept_at(&event("X"), t0 + Duration::from_millis(900)));
        assert!(gate.accept_at(&event("X"), t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn reset_unlocks_immediately() {
        let mut gate = ScanGate::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(gate.accept_at(&event("X"), t0));
        gate.reset();
        assert!(gate.accept_at(&event("X"), t0 + Duration::from_millis(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn unlocks_as_time_passes() {
        let mut gate = ScanGate::new(Duration::from_millis(2000));
        assert!(gate.accept(&event("ABC123")));
        assert!(gate.is_locked());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!gate.accept(&event("ABC123")));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!gate.is_locked());
        assert!(gate.accept(&event("ABC123")));
    }
}
