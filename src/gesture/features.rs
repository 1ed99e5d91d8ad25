use super::{
    config::{GestureConfig, TapThresholds},
    types::RejectReason,
};
use crate::tracker::{distance_sq, GestureCandidate};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TapAssessment {
    pub accepted: bool,
    pub reason: RejectReason,
}

impl TapAssessment {
    const fn accept() -> Self {
        Self {
            accepted: true,
            reason: RejectReason::None,
        }
    }

    const fn reject(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}

/// First configured region containing the candidate's down point.
pub fn locate_region(config: &GestureConfig, candidate: &GestureCandidate) -> Option<usize> {
    config.region_at(candidate.down_x, candidate.down_y)
}

pub fn assess_single_tap(candidate: &GestureCandidate, cfg: &TapThresholds) -> TapAssessment {
    if candidate.duration() > cfg.max_tap_duration {
        return TapAssessment::reject(RejectReason::TapTooLong);
    }
    if candidate.displacement_sq() > squared(cfg.max_tap_displacement) {
        return TapAssessment::reject(RejectReason::TapDrifted);
    }
    TapAssessment::accept()
}

pub fn assess_pair(
    first: &GestureCandidate,
    second: &GestureCandidate,
    cfg: &TapThresholds,
) -> TapAssessment {
    if second.up_at.saturating_sub(first.up_at) > cfg.max_inter_tap_gap {
        return TapAssessment::reject(RejectReason::GapTooLong);
    }
    let separation = distance_sq(
        (first.down_x, first.down_y),
        (second.down_x, second.down_y),
    );
    if separation > squared(cfg.max_inter_tap_displacement) {
        return TapAssessment::reject(RejectReason::TapsTooFarApart);
    }
    TapAssessment::accept()
}

fn squared(px: u32) -> i64 {
    i64::from(px) * i64::from(px)
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::gesture::types::GestureName;

    fn tap(down_ms: u64, up_ms: u64, x: i32, y: i32) -> GestureCandidate {
        GestureCandidate {
            slot: 0,
            down_at: Duration::from_millis(down_ms),
            down_x: x,
            down_y: y,
            up_at: Duration::from_millis(up_ms),
            up_x: x,
            up_y: y,
        }
    }

    #[test]
    fn slow_press_is_not_a_tap() {
        let cfg = TapThresholds::default();
        let assessment = assess_single_tap(&tap(0, 301, 10, 10), &cfg);
        assert_eq!(assessment.reason, RejectReason::TapTooLong);
        assert!(assess_single_tap(&tap(0, 300, 10, 10), &cfg).accepted);
    }

    #[test]
    fn drag_is_not_a_tap() {
        let cfg = TapThresholds::default();
        let mut drag = tap(0, 100, 10, 10);
        drag.up_x = 10 + 41;
        assert_eq!(
            assess_single_tap(&drag, &cfg).reason,
            RejectReason::TapDrifted
        );
        drag.up_x = 10 + 40;
        assert!(assess_single_tap(&drag, &cfg).accepted);
    }

    #[test]
    fn pair_checks_gap_then_distance() {
        let cfg = TapThresholds::default();
        let first = tap(0, 100, 100, 100);
        assert!(assess_pair(&first, &tap(500, 800, 100, 100), &cfg).accepted);
        assert_eq!(
            assess_pair(&first, &tap(600, 801, 100, 100), &cfg).reason,
            RejectReason::GapTooLong
        );
        assert_eq!(
            assess_pair(&first, &tap(200, 300, 300, 100), &cfg).reason,
            RejectReason::TapsTooFarApart
        );
    }

    #[test]
    fn first_matching_region_wins() {
        let config = GestureConfig::default();
        let left = locate_region(&config, &tap(0, 50, 100, 100)).unwrap();
        assert_eq!(config.gestures[left].name, GestureName::Left);
        assert_eq!(locate_region(&config, &tap(0, 50, 600, 100)), None);
        assert_eq!(locate_region(&config, &tap(0, 50, 600, 1100)), None);
    }
}
