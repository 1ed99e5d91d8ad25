use core::time::Duration;
use std::{collections::BTreeMap, io};

use crate::{
    error::DispatchError,
    event::{EventKind, Frame, RawEvent, TRACKING_ID_LIFT},
    gesture::{ActionSource, GestureConfig, GestureEvent, GestureName, SwipeSpec},
};

/// Destination for synthetic event sequences.
pub trait OutputSink {
    /// Receives the complete, rebased sequence for one gesture, terminating
    /// sync included.
    fn emit(&mut self, name: GestureName, events: &[RawEvent]) -> io::Result<()>;
}

/// Synthetic event template for one gesture. Timestamps are relative to the
/// start of the action; the template carries no trailing sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionSpec {
    events: Vec<RawEvent>,
}

impl ActionSpec {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self { events }
    }

    /// One frame per step along a straight line from `from` to `to`, then a
    /// lift frame at `duration`.
    pub fn swipe(spec: &SwipeSpec) -> Self {
        let steps = u32::from(spec.steps.max(1));
        let mut events = Vec::with_capacity(steps as usize * 3 + 3);
        for step in 0..steps {
            let at = spec.duration * step / steps;
            let (x, y) = lerp(spec.from, spec.to, step, steps.saturating_sub(1).max(1));
            if step == 0 {
                events.push(RawEvent::new(EventKind::TrackingId, spec.tracking_id, at));
            }
            events.push(RawEvent::new(EventKind::AbsX, x, at));
            events.push(RawEvent::new(EventKind::AbsY, y, at));
            if step == 0 {
                events.push(RawEvent::new(EventKind::Pressure, spec.pressure, at));
            }
            events.push(RawEvent::sync(at));
        }
        events.push(RawEvent::new(
            EventKind::TrackingId,
            TRACKING_ID_LIFT,
            spec.duration,
        ));
        Self { events }
    }

    /// Replays captured frames as they were recorded, shifted so the first
    /// frame starts the action.
    pub fn recorded(frames: &[Frame]) -> Self {
        let start = frames.first().map(Frame::timestamp).unwrap_or_default();
        let mut events: Vec<RawEvent> = frames
            .iter()
            .flat_map(Frame::events)
            .map(|event| RawEvent {
                timestamp: event.timestamp.saturating_sub(start),
                ..*event
            })
            .collect();
        if events.last().is_some_and(RawEvent::is_sync) {
            events.pop();
        }
        Self { events }
    }

    pub fn from_source(source: &ActionSource) -> Self {
        match source {
            ActionSource::Swipe(swipe) => Self::swipe(swipe),
            ActionSource::Recorded(recorded) => Self::recorded(&recorded.frames),
        }
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    pub fn duration(&self) -> Duration {
        self.events
            .last()
            .map(|event| event.timestamp)
            .unwrap_or_default()
    }

    /// Template shifted onto `at`, closed by a sync.
    pub fn rebased(&self, at: Duration) -> Vec<RawEvent> {
        let mut out: Vec<RawEvent> = self
            .events
            .iter()
            .map(|event| RawEvent {
                timestamp: at + event.timestamp,
                ..*event
            })
            .collect();
        out.push(RawEvent::sync(at + self.duration()));
        out
    }
}

fn lerp(from: (i32, i32), to: (i32, i32), step: u32, last: u32) -> (i32, i32) {
    let axis = |a: i32, b: i32| {
        let delta = i64::from(b) - i64::from(a);
        let offset = delta * i64::from(step.min(last)) / i64::from(last);
        (i64::from(a) + offset) as i32
    };
    (axis(from.0, to.0), axis(from.1, to.1))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionTable {
    actions: BTreeMap<GestureName, ActionSpec>,
}

impl ActionTable {
    pub fn from_config(config: &GestureConfig) -> Self {
        Self {
            actions: config
                .actions
                .iter()
                .map(|(name, source)| (*name, ActionSpec::from_source(source)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: GestureName, action: ActionSpec) {
        self.actions.insert(name, action);
    }

    pub fn get(&self, name: GestureName) -> Option<&ActionSpec> {
        self.actions.get(&name)
    }

    /// Emits the action bound to the gesture through `sink`.
    pub fn dispatch(
        &self,
        gesture: &GestureEvent,
        sink: &mut dyn OutputSink,
    ) -> Result<(), DispatchError> {
        let action = self
            .get(gesture.name)
            .ok_or(DispatchError::UnknownGesture(gesture.name))?;
        let events = action.rebased(gesture.at);
        log::info!("gesture {}", gesture.name);
        log::debug!(
            "dispatching {} events for {} at {}ms",
            events.len(),
            gesture.name,
            gesture.at.as_millis()
        );
        sink.emit(gesture.name, &events)?;
        Ok(())
    }
}

/// Sink that writes nothing to a device; it keeps what it was given so the
/// dry-run mode and tests can inspect it.
#[derive(Debug, Default)]
pub struct LogSink {
    lines: Vec<String>,
    events: Vec<RawEvent>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }
}

impl OutputSink for LogSink {
    fn emit(&mut self, name: GestureName, events: &[RawEvent]) -> io::Result<()> {
        log::info!("dry-run: {} synthetic events for {name}", events.len());
        self.lines.push(format!("gesture {name}"));
        self.events.extend_from_slice(events);
        Ok(())
    }
}
