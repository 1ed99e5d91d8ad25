pub mod config;
pub mod features;
pub mod tap_hsm;
pub mod trace;
pub mod types;

pub use config::{
    validate_config, ActionSource, GestureConfig, GestureSpec, Geometry, Quadrant, Rect,
    RecordedAction, ScreenSize, SwipeSpec, TapThresholds,
};
pub use tap_hsm::{GestureMatcher, RegionId};
pub use trace::MatchTraceSample;
pub use types::{GestureEvent, GestureName, MatcherStateId, RejectReason};
