//! Deterministic touch trajectories for named gestures.

use core::time::Duration;
use std::collections::BTreeMap;

use crate::{
    error::TrajectoryError,
    event::{EventKind, Frame, RawEvent, TRACKING_ID_LIFT},
    gesture::{GestureConfig, GestureName},
    tracker::MAX_SLOTS,
};

/// Longest gap between frames; shortened when a region's limits need it.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(4);
/// Frames per tap: one down, the moves, one lift.
pub const TAP_FRAMES: usize = 39;
/// Longest pause between the first lift and the second down.
pub const INTER_TAP_DELAY: Duration = Duration::from_millis(200);
/// Largest diagonal shift of the second tap.
pub const SECOND_TAP_OFFSET: i32 = 6;
pub const BASE_TIME: Duration = Duration::from_secs(1);

const JITTER: [i32; 4] = [0, 1, 0, -1];
const PRESSURE_FLOOR: i32 = 40;
const PRESSURE_STEP: i32 = 3;

/// Field updates of one slot that share a timestamp.
type SlotStep = (Duration, Vec<(EventKind, i32)>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pattern {
    Tap,
    DoubleTap,
}

/// Timing and placement of a generated tap pair, fitted to one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapTiming {
    pub origin: (i32, i32),
    pub interval: Duration,
    pub delay: Duration,
    pub offset: i32,
    pub jitter: i32,
}

impl TapTiming {
    /// Time from a tap's down frame to its lift frame.
    pub fn length(&self) -> Duration {
        self.interval * (TAP_FRAMES as u32 - 1)
    }

    /// Time between the two lifts of a double tap.
    pub fn lift_gap(&self) -> Duration {
        self.length() + self.delay
    }
}

pub struct TrajectoryGenerator {
    config: GestureConfig,
}

impl TrajectoryGenerator {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Names understood by [`TrajectoryGenerator::generate`] for this config.
    pub fn names(&self) -> Vec<String> {
        self.config
            .gestures
            .iter()
            .flat_map(|spec| [format!("tap_{}", spec.name), format!("double_tap_{}", spec.name)])
            .collect()
    }

    pub fn generate(&self, name: &str) -> Result<Vec<Frame>, TrajectoryError> {
        self.generate_concurrent(&[name])
    }

    /// Runs each trajectory on its own slot, in argument order, and merges
    /// them into shared frames.
    pub fn generate_concurrent(&self, names: &[&str]) -> Result<Vec<Frame>, TrajectoryError> {
        if names.len() > MAX_SLOTS {
            return Err(TrajectoryError::TooManySlots {
                count: names.len(),
                max: MAX_SLOTS,
            });
        }

        let mut merged: BTreeMap<Duration, Vec<(u8, Vec<(EventKind, i32)>)>> = BTreeMap::new();
        for (slot, name) in names.iter().enumerate() {
            let slot = slot as u8;
            for (at, fields) in self.steps(name, slot)? {
                merged.entry(at).or_default().push((slot, fields));
            }
        }

        let frames = merged
            .into_iter()
            .map(|(at, mut updates)| {
                updates.sort_by_key(|(slot, _)| *slot);
                let mut cursor = 0u8;
                let mut events = Vec::new();
                for (slot, fields) in updates {
                    if slot != cursor {
                        events.push(RawEvent::new(EventKind::Slot, i32::from(slot), at));
                        cursor = slot;
                    }
                    events.extend(
                        fields
                            .into_iter()
                            .map(|(kind, value)| RawEvent::new(kind, value, at)),
                    );
                }
                Frame::new(events, at)
            })
            .collect::<Vec<_>>();
        log::debug!("generated {} frames for {:?}", frames.len(), names);
        Ok(frames)
    }

    /// Fits the tap shape inside the region's thresholds and bounds. The
    /// second down stays attributed to the same region.
    pub fn timing(&self, region: GestureName) -> Option<TapTiming> {
        let index = self
            .config
            .gestures
            .iter()
            .position(|spec| spec.name == region)?;
        let spec = &self.config.gestures[index];
        let limits = &spec.thresholds;

        let moves = TAP_FRAMES as u64 - 1;
        let interval_us = micros(FRAME_INTERVAL)
            .min(micros(limits.max_tap_duration) / moves)
            .min(micros(limits.max_inter_tap_gap) / (moves + 1))
            .max(1);
        let interval = Duration::from_micros(interval_us);
        let length = interval * (TAP_FRAMES as u32 - 1);
        let delay = INTER_TAP_DELAY
            .min(limits.max_inter_tap_gap.saturating_sub(length))
            .max(interval);

        let jitter = if limits.max_tap_displacement == 0 { 0 } else { 1 };

        let origin = spec.geometry.centre(self.config.screen);
        let reach = i64::from(limits.max_inter_tap_displacement);
        let offset = (0..=SECOND_TAP_OFFSET)
            .rev()
            .find(|&offset| {
                2 * i64::from(offset).pow(2) <= reach * reach
                    && self.config.region_at(origin.0 + offset, origin.1 + offset) == Some(index)
            })
            .unwrap_or(0);

        Some(TapTiming {
            origin,
            interval,
            delay,
            offset,
            jitter,
        })
    }

    fn steps(&self, name: &str, slot: u8) -> Result<Vec<SlotStep>, TrajectoryError> {
        let unknown = || TrajectoryError::UnknownTrajectory(name.to_owned());
        let (pattern, region) = if let Some(region) = name.strip_prefix("double_tap_") {
            (Pattern::DoubleTap, region)
        } else if let Some(region) = name.strip_prefix("tap_") {
            (Pattern::Tap, region)
        } else {
            return Err(unknown());
        };
        let region: GestureName = region.parse().map_err(|_| unknown())?;
        let timing = self.timing(region).ok_or_else(unknown)?;
        let (x, y) = timing.origin;

        let base_id = 1 + i32::from(slot) * 16;
        let mut steps = tap_steps(BASE_TIME, (x, y), base_id, &timing);
        if pattern == Pattern::DoubleTap {
            let second_start = BASE_TIME + timing.lift_gap();
            steps.extend(tap_steps(
                second_start,
                (x + timing.offset, y + timing.offset),
                base_id + 1,
                &timing,
            ));
        }
        Ok(steps)
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn tap_steps(start: Duration, (x, y): (i32, i32), tracking_id: i32, timing: &TapTiming) -> Vec<SlotStep> {
    let moves = TAP_FRAMES - 2;
    let mut steps = Vec::with_capacity(TAP_FRAMES);
    steps.push((
        start,
        vec![
            (EventKind::TrackingId, tracking_id),
            (EventKind::AbsX, x),
            (EventKind::AbsY, y),
            (EventKind::Pressure, PRESSURE_FLOOR),
        ],
    ));
    for i in 1..=moves {
        let at = start + timing.interval * i as u32;
        // Rise then fall over the contact.
        let ramp = i.min(moves + 1 - i) as i32;
        steps.push((
            at,
            vec![
                (EventKind::AbsX, x + timing.jitter * JITTER[i % JITTER.len()]),
                (EventKind::AbsY, y + timing.jitter * JITTER[(i + 1) % JITTER.len()]),
                (EventKind::Pressure, PRESSURE_FLOOR + ramp * PRESSURE_STEP),
            ],
        ));
    }
    steps.push((
        start + timing.length(),
        vec![(EventKind::TrackingId, TRACKING_ID_LIFT)],
    ));
    steps
}
