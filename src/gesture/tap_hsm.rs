use core::time::Duration;

use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::{GestureConfig, GestureSpec},
    features::{assess_pair, assess_single_tap, locate_region},
    trace::MatchTraceSample,
    types::{GestureEvent, GestureName, MatcherStateId, RejectReason},
};
use crate::tracker::GestureCandidate;

pub type RegionId = usize;

#[derive(Clone, Copy, Debug)]
enum TapHsmEvent {
    Tap(GestureCandidate),
    Reset { at: Duration },
}

#[derive(Default)]
struct DispatchContext {
    emitted: Option<GestureEvent>,
}

/// Double-tap recognizer. Owns one statechart per configured region; a
/// region's pending tap only expires when the next qualifying tap for that
/// region is observed.
pub struct GestureMatcher {
    config: GestureConfig,
    regions: Vec<statig::blocking::StateMachine<TapHsm>>,
    last_trace: MatchTraceSample,
}

impl GestureMatcher {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
            regions: config
                .gestures
                .iter()
                .map(|spec| TapHsm::new(*spec).state_machine())
                .collect(),
            last_trace: MatchTraceSample::default(),
        }
    }

    pub fn observe(&mut self, candidate: &GestureCandidate) -> Option<GestureEvent> {
        let Some(region) = locate_region(&self.config, candidate) else {
            self.reject(candidate, None, RejectReason::OutsideRegions);
            return None;
        };

        let spec = self.config.gestures[region];
        let assessment = assess_single_tap(candidate, &spec.thresholds);
        if !assessment.accepted {
            self.reject(candidate, Some(spec.name), assessment.reason);
            return None;
        }

        let machine = &mut self.regions[region];
        let mut context = DispatchContext::default();
        machine.handle_with_context(&TapHsmEvent::Tap(*candidate), &mut context);
        self.last_trace = machine.inner().last_trace;
        log::debug!(
            "tap slot={} region={} state={:?} reason={:?} window_ms={}",
            candidate.slot,
            spec.name,
            self.last_trace.state_id,
            self.last_trace.reject_reason,
            self.last_trace.window_ms
        );
        context.emitted
    }

    /// Drops every pending tap.
    pub fn reset(&mut self, at: Duration) {
        for machine in &mut self.regions {
            let mut context = DispatchContext::default();
            machine.handle_with_context(&TapHsmEvent::Reset { at }, &mut context);
        }
    }

    pub fn state_of(&self, region: RegionId) -> Option<MatcherStateId> {
        self.regions
            .get(region)
            .map(|machine| machine.inner().last_trace.state_id)
    }

    pub fn region_of(&self, name: GestureName) -> Option<RegionId> {
        self.config.gestures.iter().position(|spec| spec.name == name)
    }

    pub fn last_trace(&self) -> MatchTraceSample {
        self.last_trace
    }

    fn reject(
        &mut self,
        candidate: &GestureCandidate,
        region: Option<GestureName>,
        reason: RejectReason,
    ) {
        let state_id = region
            .and_then(|name| self.region_of(name))
            .and_then(|id| self.state_of(id))
            .unwrap_or_default();
        self.last_trace = MatchTraceSample {
            at: candidate.up_at,
            slot: candidate.slot,
            region,
            state_id,
            reject_reason: reason,
            window_ms: 0,
            emitted: false,
        };
        log::debug!(
            "discarded contact slot={} down=({},{}) duration_ms={} reason={:?}",
            candidate.slot,
            candidate.down_x,
            candidate.down_y,
            candidate.duration().as_millis(),
            reason
        );
    }
}

struct TapHsm {
    spec: GestureSpec,
    last_trace: MatchTraceSample,
}

impl TapHsm {
    fn new(spec: GestureSpec) -> Self {
        Self {
            spec,
            last_trace: MatchTraceSample {
                region: Some(spec.name),
                state_id: MatcherStateId::Idle,
                ..MatchTraceSample::default()
            },
        }
    }

    fn update_trace(
        &mut self,
        candidate: &GestureCandidate,
        state_id: MatcherStateId,
        reason: RejectReason,
        window: Duration,
        emitted: bool,
    ) {
        self.last_trace = MatchTraceSample {
            at: candidate.up_at,
            slot: candidate.slot,
            region: Some(self.spec.name),
            state_id,
            reject_reason: reason,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            emitted,
        };
    }

    fn update_reset_trace(&mut self, at: Duration) {
        self.last_trace = MatchTraceSample {
            at,
            region: Some(self.spec.name),
            state_id: MatcherStateId::Idle,
            ..MatchTraceSample::default()
        };
    }
}

#[state_machine(initial = "State::idle()")]
impl TapHsm {
    #[state]
    fn idle(&mut self, event: &TapHsmEvent) -> Outcome<State> {
        match event {
            TapHsmEvent::Tap(candidate) => {
                self.update_trace(
                    candidate,
                    MatcherStateId::Pending,
                    RejectReason::None,
                    Duration::ZERO,
                    false,
                );
                Transition(State::pending(*candidate))
            }
            TapHsmEvent::Reset { at } => {
                self.update_reset_trace(*at);
                Handled
            }
        }
    }

    #[state]
    fn pending(
        &mut self,
        first: &mut GestureCandidate,
        context: &mut DispatchContext,
        event: &TapHsmEvent,
    ) -> Outcome<State> {
        match event {
            TapHsmEvent::Tap(candidate) => {
                let window = candidate.up_at.saturating_sub(first.up_at);
                let assessment = assess_pair(first, candidate, &self.spec.thresholds);
                if !assessment.accepted {
                    // The stale tap is dropped; this one opens a new window.
                    *first = *candidate;
                    self.update_trace(
                        candidate,
                        MatcherStateId::Pending,
                        assessment.reason,
                        window,
                        false,
                    );
                    return Handled;
                }

                context.emitted = Some(GestureEvent {
                    name: self.spec.name,
                    at: candidate.up_at,
                });
                self.update_trace(
                    candidate,
                    MatcherStateId::Idle,
                    RejectReason::None,
                    window,
                    true,
                );
                Transition(State::idle())
            }
            TapHsmEvent::Reset { at } => {
                self.update_reset_trace(*at);
                Transition(State::idle())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(down_ms: u64, x: i32, y: i32) -> GestureCandidate {
        GestureCandidate {
            slot: 0,
            down_at: Duration::from_millis(down_ms),
            down_x: x,
            down_y: y,
            up_at: Duration::from_millis(down_ms + 80),
            up_x: x + 1,
            up_y: y,
        }
    }

    fn matcher() -> GestureMatcher {
        GestureMatcher::new(&GestureConfig::default())
    }

    #[test]
    fn second_tap_in_window_emits_and_returns_to_idle() {
        let mut matcher = matcher();
        let left = matcher.region_of(GestureName::Left).unwrap();

        assert_eq!(matcher.observe(&tap(1_000, 200, 500)), None);
        assert_eq!(matcher.state_of(left), Some(MatcherStateId::Pending));

        let event = matcher.observe(&tap(1_300, 205, 503)).unwrap();
        assert_eq!(event.name, GestureName::Left);
        assert_eq!(event.at, Duration::from_millis(1_380));
        assert_eq!(matcher.state_of(left), Some(MatcherStateId::Idle));
        assert!(matcher.last_trace().emitted);
        assert_eq!(matcher.last_trace().window_ms, 300);
    }

    #[test]
    fn third_tap_starts_a_fresh_sequence() {
        let mut matcher = matcher();
        let _ = matcher.observe(&tap(1_000, 200, 500));
        assert!(matcher.observe(&tap(1_200, 200, 500)).is_some());
        assert_eq!(matcher.observe(&tap(1_400, 200, 500)), None);
    }

    #[test]
    fn late_second_tap_replaces_the_pending_one() {
        let mut matcher = matcher();
        let _ = matcher.observe(&tap(1_000, 200, 500));
        assert_eq!(matcher.observe(&tap(3_000, 200, 500)), None);
        assert_eq!(
            matcher.last_trace().reject_reason,
            RejectReason::GapTooLong
        );
        assert!(matcher.observe(&tap(3_300, 200, 500)).is_some());
    }

    #[test]
    fn far_apart_taps_do_not_pair() {
        let mut matcher = matcher();
        let _ = matcher.observe(&tap(1_000, 50, 100));
        assert_eq!(matcher.observe(&tap(1_200, 450, 900)), None);
        assert_eq!(
            matcher.last_trace().reject_reason,
            RejectReason::TapsTooFarApart
        );
    }

    #[test]
    fn taps_in_different_regions_keep_separate_state() {
        let mut matcher = matcher();
        let right = matcher.region_of(GestureName::Right).unwrap();
        let _ = matcher.observe(&tap(1_000, 200, 500));
        assert_eq!(matcher.observe(&tap(1_100, 1_000, 500)), None);
        assert_eq!(matcher.state_of(right), Some(MatcherStateId::Pending));

        let event = matcher.observe(&tap(1_250, 202, 500)).unwrap();
        assert_eq!(event.name, GestureName::Left);
        let event = matcher.observe(&tap(1_300, 1_001, 500)).unwrap();
        assert_eq!(event.name, GestureName::Right);
    }

    #[test]
    fn rejected_taps_leave_pending_state_untouched() {
        let mut matcher = matcher();
        let left = matcher.region_of(GestureName::Left).unwrap();
        let _ = matcher.observe(&tap(1_000, 200, 500));

        let mut slow = tap(1_100, 200, 500);
        slow.up_at = Duration::from_millis(1_600);
        assert_eq!(matcher.observe(&slow), None);
        assert_eq!(matcher.last_trace().reject_reason, RejectReason::TapTooLong);
        assert_eq!(matcher.state_of(left), Some(MatcherStateId::Pending));

        assert!(matcher.observe(&tap(1_650, 200, 500)).is_some());
    }

    #[test]
    fn reset_drops_pending_taps() {
        let mut matcher = matcher();
        let left = matcher.region_of(GestureName::Left).unwrap();
        let _ = matcher.observe(&tap(1_000, 200, 500));
        matcher.reset(Duration::from_millis(1_050));
        assert_eq!(matcher.state_of(left), Some(MatcherStateId::Idle));
        assert_eq!(matcher.observe(&tap(1_200, 200, 500)), None);
    }

    #[test]
    fn contact_outside_every_region_is_discarded() {
        let mut matcher = matcher();
        assert_eq!(matcher.observe(&tap(1_000, 600, 1_100)), None);
        assert_eq!(
            matcher.last_trace().reject_reason,
            RejectReason::OutsideRegions
        );
        assert_eq!(matcher.last_trace().region, None);
    }
}
