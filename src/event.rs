use core::time::Duration;

use crate::error::MalformedStreamError;

pub const EV_SYN: u16 = 0x00;
pub const EV_ABS: u16 = 0x03;
pub const SYN_REPORT: u16 = 0x00;
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MT_PRESSURE: u16 = 0x3a;

/// Tracking id value the protocol uses to mark a lifted contact.
pub const TRACKING_ID_LIFT: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Sync,
    AbsX,
    AbsY,
    TrackingId,
    Slot,
    Pressure,
    Other { ev_type: u16, code: u16 },
}

impl EventKind {
    pub const fn from_codes(ev_type: u16, code: u16) -> Self {
        match (ev_type, code) {
            (EV_SYN, SYN_REPORT) => Self::Sync,
            (EV_ABS, ABS_MT_POSITION_X) => Self::AbsX,
            (EV_ABS, ABS_MT_POSITION_Y) => Self::AbsY,
            (EV_ABS, ABS_MT_TRACKING_ID) => Self::TrackingId,
            (EV_ABS, ABS_MT_SLOT) => Self::Slot,
            (EV_ABS, ABS_MT_PRESSURE) => Self::Pressure,
            (ev_type, code) => Self::Other { ev_type, code },
        }
    }

    pub const fn codes(self) -> (u16, u16) {
        match self {
            Self::Sync => (EV_SYN, SYN_REPORT),
            Self::AbsX => (EV_ABS, ABS_MT_POSITION_X),
            Self::AbsY => (EV_ABS, ABS_MT_POSITION_Y),
            Self::TrackingId => (EV_ABS, ABS_MT_TRACKING_ID),
            Self::Slot => (EV_ABS, ABS_MT_SLOT),
            Self::Pressure => (EV_ABS, ABS_MT_PRESSURE),
            Self::Other { ev_type, code } => (ev_type, code),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub value: i32,
    pub timestamp: Duration,
}

impl RawEvent {
    pub const fn new(kind: EventKind, value: i32, timestamp: Duration) -> Self {
        Self {
            kind,
            value,
            timestamp,
        }
    }

    pub const fn sync(timestamp: Duration) -> Self {
        Self::new(EventKind::Sync, 0, timestamp)
    }

    pub fn is_sync(&self) -> bool {
        self.kind == EventKind::Sync
    }
}

/// One atomic snapshot of the touch surface: events up to and including a
/// terminating sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    events: Vec<RawEvent>,
}

impl Frame {
    /// Builds a frame from field events, appending the terminating sync.
    pub fn new(mut events: Vec<RawEvent>, timestamp: Duration) -> Self {
        events.retain(|event| !event.is_sync());
        events.push(RawEvent::sync(timestamp));
        Self { events }
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    /// Field events, without the terminating sync.
    pub fn fields(&self) -> &[RawEvent] {
        &self.events[..self.events.len() - 1]
    }

    pub fn timestamp(&self) -> Duration {
        self.events[self.events.len() - 1].timestamp
    }

    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }
}

pub trait EventSource {
    fn next_event(&mut self) -> Result<Option<RawEvent>, MalformedStreamError>;
}

impl<I> EventSource for I
where
    I: Iterator<Item = RawEvent>,
{
    fn next_event(&mut self) -> Result<Option<RawEvent>, MalformedStreamError> {
        Ok(self.next())
    }
}

/// Reads events until a sync closes the frame. `Ok(None)` means the source
/// ended cleanly on a frame boundary.
pub fn parse_frame<S>(source: &mut S) -> Result<Option<Frame>, MalformedStreamError>
where
    S: EventSource + ?Sized,
{
    let mut events = Vec::new();
    loop {
        match source.next_event()? {
            Some(event) if event.is_sync() => {
                events.push(event);
                return Ok(Some(Frame { events }));
            }
            Some(event) => events.push(event),
            None if events.is_empty() => return Ok(None),
            None => {
                return Err(MalformedStreamError::TruncatedFrame {
                    pending: events.len(),
                })
            }
        }
    }
}

pub struct Frames<S> {
    source: S,
    failed: bool,
}

impl<S: EventSource> Frames<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            failed: false,
        }
    }
}

impl<S: EventSource> Iterator for Frames<S> {
    type Item = Result<Frame, MalformedStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match parse_frame(&mut self.source) {
            Ok(frame) => frame.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

pub fn flatten_frames<'a, I>(frames: I) -> impl Iterator<Item = RawEvent> + 'a
where
    I: IntoIterator<Item = &'a Frame>,
    I::IntoIter: 'a,
{
    frames
        .into_iter()
        .flat_map(|frame| frame.events().iter().copied())
}
