use core::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureName {
    Left,
    Right,
    Top,
    Bottom,
}

impl GestureName {
    pub const ALL: [GestureName; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for GestureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown gesture name `{s}`"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureEvent {
    pub name: GestureName,
    pub at: Duration,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum RejectReason {
    #[default]
    None = 0,
    OutsideRegions = 1,
    TapTooLong = 2,
    TapDrifted = 3,
    GapTooLong = 4,
    TapsTooFarApart = 5,
}

impl RejectReason {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum MatcherStateId {
    #[default]
    Idle = 0,
    Pending = 1,
}

impl MatcherStateId {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
