use core::time::Duration;

use crate::event::{EventKind, Frame, TRACKING_ID_LIFT};

pub const MAX_SLOTS: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactState {
    pub slot: u8,
    pub tracking_id: Option<i32>,
    pub x: i32,
    pub y: i32,
    pub down_at: Option<Duration>,
    pub down_x: i32,
    pub down_y: i32,
    down_frozen: bool,
}

impl ContactState {
    fn new(slot: u8) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.tracking_id.is_some()
    }

    fn begin(&mut self, tracking_id: i32, at: Duration) {
        self.tracking_id = Some(tracking_id);
        self.down_at = Some(at);
        self.down_frozen = false;
    }

    fn freeze_down_point(&mut self) {
        if self.is_active() && !self.down_frozen {
            self.down_x = self.x;
            self.down_y = self.y;
            self.down_frozen = true;
        }
    }

    fn end(&mut self, at: Duration) -> Option<GestureCandidate> {
        let down_at = self.down_at?;
        self.freeze_down_point();
        let candidate = GestureCandidate {
            slot: self.slot,
            down_at,
            down_x: self.down_x,
            down_y: self.down_y,
            up_at: at,
            up_x: self.x,
            up_y: self.y,
        };
        self.tracking_id = None;
        self.down_at = None;
        self.down_frozen = false;
        Some(candidate)
    }
}

/// One finished contact lifecycle, down to up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureCandidate {
    pub slot: u8,
    pub down_at: Duration,
    pub down_x: i32,
    pub down_y: i32,
    pub up_at: Duration,
    pub up_x: i32,
    pub up_y: i32,
}

impl GestureCandidate {
    pub fn duration(&self) -> Duration {
        self.up_at.saturating_sub(self.down_at)
    }

    pub fn displacement_sq(&self) -> i64 {
        distance_sq((self.down_x, self.down_y), (self.up_x, self.up_y))
    }
}

pub fn distance_sq(a: (i32, i32), b: (i32, i32)) -> i64 {
    let dx = i64::from(a.0) - i64::from(b.0);
    let dy = i64::from(a.1) - i64::from(b.1);
    dx * dx + dy * dy
}

pub struct ContactTracker {
    slots: [ContactState; MAX_SLOTS],
}

impl Default for ContactTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactTracker {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|slot| ContactState::new(slot as u8)),
        }
    }

    pub fn slot(&self, slot: u8) -> Option<&ContactState> {
        self.slots.get(usize::from(slot))
    }

    pub fn active_contacts(&self) -> impl Iterator<Item = &ContactState> {
        self.slots.iter().filter(|state| state.is_active())
    }

    /// Applies one frame and returns the lifecycles it closed, by ascending
    /// slot id.
    pub fn apply(&mut self, frame: &Frame) -> Vec<GestureCandidate> {
        let at = frame.timestamp();
        let mut cursor: Option<usize> = Some(0);
        let mut committed = Vec::new();

        for event in frame.fields() {
            if event.kind == EventKind::Slot {
                cursor = usize::try_from(event.value)
                    .ok()
                    .filter(|slot| *slot < MAX_SLOTS);
                if cursor.is_none() {
                    log::trace!("ignoring out of range slot {}", event.value);
                }
                continue;
            }

            let Some(state) = cursor.map(|slot| &mut self.slots[slot]) else {
                continue;
            };

            match event.kind {
                EventKind::AbsX => state.x = event.value,
                EventKind::AbsY => state.y = event.value,
                EventKind::TrackingId if event.value == TRACKING_ID_LIFT => {
                    if let Some(candidate) = state.end(at) {
                        committed.push(candidate);
                    }
                }
                EventKind::TrackingId if event.value < 0 => {
                    log::trace!("ignoring negative tracking id {}", event.value);
                }
                EventKind::TrackingId => match state.tracking_id {
                    Some(current) if current == event.value => {}
                    Some(_) => {
                        if let Some(candidate) = state.end(at) {
                            committed.push(candidate);
                        }
                        state.begin(event.value, at);
                    }
                    None => state.begin(event.value, at),
                },
                _ => {}
            }
        }

        for state in &mut self.slots {
            state.freeze_down_point();
        }

        committed.sort_by_key(|candidate| candidate.slot);
        committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;

    fn frame(ms: u64, fields: &[(EventKind, i32)]) -> Frame {
        let at = Duration::from_millis(ms);
        Frame::new(
            fields
                .iter()
                .map(|(kind, value)| RawEvent::new(*kind, *value, at))
                .collect(),
            at,
        )
    }

    #[test]
    fn tap_commits_one_candidate_with_frozen_down_point() {
        let mut tracker = ContactTracker::new();
        assert!(tracker
            .apply(&frame(
                0,
                &[
                    (EventKind::TrackingId, 5),
                    (EventKind::AbsX, 100),
                    (EventKind::AbsY, 200),
                ],
            ))
            .is_empty());
        assert!(tracker
            .apply(&frame(10, &[(EventKind::AbsX, 104)]))
            .is_empty());
        let done = tracker.apply(&frame(20, &[(EventKind::TrackingId, -1)]));

        assert_eq!(
            done,
            vec![GestureCandidate {
                slot: 0,
                down_at: Duration::from_millis(0),
                down_x: 100,
                down_y: 200,
                up_at: Duration::from_millis(20),
                up_x: 104,
                up_y: 200,
            }]
        );
        assert_eq!(tracker.active_contacts().count(), 0);
    }

    #[test]
    fn coordinates_persist_on_the_slot_between_contacts() {
        let mut tracker = ContactTracker::new();
        tracker.apply(&frame(
            0,
            &[
                (EventKind::TrackingId, 1),
                (EventKind::AbsX, 40),
                (EventKind::AbsY, 50),
            ],
        ));
        tracker.apply(&frame(5, &[(EventKind::TrackingId, -1)]));
        tracker.apply(&frame(50, &[(EventKind::TrackingId, 2)]));
        let done = tracker.apply(&frame(60, &[(EventKind::TrackingId, -1)]));

        assert_eq!(done[0].down_x, 40);
        assert_eq!(done[0].down_y, 50);
        assert_eq!(done[0].down_at, Duration::from_millis(50));
    }

    #[test]
    fn lift_on_inactive_slot_is_ignored() {
        let mut tracker = ContactTracker::new();
        assert!(tracker
            .apply(&frame(0, &[(EventKind::TrackingId, -1)]))
            .is_empty());
    }

    #[test]
    fn tracking_id_change_closes_the_previous_contact() {
        let mut tracker = ContactTracker::new();
        tracker.apply(&frame(
            0,
            &[
                (EventKind::TrackingId, 1),
                (EventKind::AbsX, 10),
                (EventKind::AbsY, 10),
            ],
        ));
        let done = tracker.apply(&frame(
            30,
            &[(EventKind::TrackingId, 2), (EventKind::AbsX, 90)],
        ));
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].up_x, 10);

        let done = tracker.apply(&frame(60, &[(EventKind::TrackingId, -1)]));
        assert_eq!(done[0].down_x, 90);
        assert_eq!(done[0].down_at, Duration::from_millis(30));
    }

    #[test]
    fn slot_cursor_resets_to_zero_each_frame() {
        let mut tracker = ContactTracker::new();
        tracker.apply(&frame(
            0,
            &[
                (EventKind::Slot, 1),
                (EventKind::TrackingId, 9),
                (EventKind::AbsX, 700),
                (EventKind::AbsY, 700),
            ],
        ));
        tracker.apply(&frame(
            5,
            &[(EventKind::TrackingId, 3), (EventKind::AbsX, 10)],
        ));

        assert_eq!(tracker.slot(0).unwrap().tracking_id, Some(3));
        assert_eq!(tracker.slot(0).unwrap().x, 10);
        assert_eq!(tracker.slot(1).unwrap().x, 700);
    }

    #[test]
    fn simultaneous_lifts_are_ordered_by_slot() {
        let mut tracker = ContactTracker::new();
        tracker.apply(&frame(
            0,
            &[
                (EventKind::Slot, 2),
                (EventKind::TrackingId, 20),
                (EventKind::Slot, 0),
                (EventKind::TrackingId, 10),
            ],
        ));
        let done = tracker.apply(&frame(
            40,
            &[
                (EventKind::Slot, 2),
                (EventKind::TrackingId, -1),
                (EventKind::Slot, 0),
                (EventKind::TrackingId, -1),
            ],
        ));
        let slots: Vec<u8> = done.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn out_of_range_slot_drops_fields_until_reselected() {
        let mut tracker = ContactTracker::new();
        tracker.apply(&frame(
            0,
            &[
                (EventKind::Slot, 99),
                (EventKind::TrackingId, 4),
                (EventKind::Slot, -3),
                (EventKind::AbsX, 5),
            ],
        ));
        assert_eq!(tracker.active_contacts().count(), 0);
        assert_eq!(tracker.slot(0).unwrap().x, 0);
    }
}
