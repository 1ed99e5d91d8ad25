use core::time::Duration;

use super::types::{GestureName, MatcherStateId, RejectReason};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchTraceSample {
    pub at: Duration,
    pub slot: u8,
    pub region: Option<GestureName>,
    pub state_id: MatcherStateId,
    pub reject_reason: RejectReason,
    pub window_ms: u64,
    pub emitted: bool,
}
