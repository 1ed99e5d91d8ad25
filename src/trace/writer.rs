use std::io::{self, Write};

use super::{header_bytes, RecordKind, SlotRecord, FRAME_HEADER_LEN, HEADER_LEN, RECORD_LEN};
use crate::{
    event::{EventKind, Frame, TRACKING_ID_LIFT},
    tracker::MAX_SLOTS,
};

#[derive(Clone, Copy, Debug, Default)]
struct SlotShadow {
    tracking_id: Option<i32>,
    x: i32,
    y: i32,
    pressure: i32,
    open: Option<RecordKind>,
}

impl SlotShadow {
    fn record(&self, kind: RecordKind, slot: usize) -> SlotRecord {
        SlotRecord {
            kind,
            slot: slot as u8,
            tracking_id: self.tracking_id.unwrap_or(TRACKING_ID_LIFT),
            x: self.x,
            y: self.y,
            pressure: self.pressure,
        }
    }
}

/// Streams frames into the trace format. The header is written on the first
/// frame, or by [`TraceWriter::finish`] for an empty trace.
pub struct TraceWriter<W: Write> {
    writer: W,
    slots: [SlotShadow; MAX_SLOTS],
    header_written: bool,
    frames: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            slots: [SlotShadow::default(); MAX_SLOTS],
            header_written: false,
            frames: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if !self.header_written {
            self.writer.write_all(&header_bytes())?;
            self.header_written = true;
        }

        let timestamp_us = u64::try_from(frame.timestamp().as_micros()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "frame timestamp overflows u64")
        })?;
        let records = self.collapse(frame);
        let record_count = u16::try_from(records.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "too many records in one frame")
        })?;

        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + records.len() * RECORD_LEN);
        buf.extend_from_slice(&timestamp_us.to_le_bytes());
        buf.extend_from_slice(&record_count.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        for record in &records {
            buf.extend_from_slice(&record.to_bytes());
        }
        self.writer.write_all(&buf)?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        if !self.header_written {
            self.writer.write_all(&header_bytes())?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Folds a frame's field events into slot records. Coordinate and pressure
    /// updates fold into the slot's open record; tracking id changes close it.
    fn collapse(&mut self, frame: &Frame) -> Vec<SlotRecord> {
        let mut records = Vec::new();
        let mut cursor: Option<usize> = Some(0);

        for event in frame.fields() {
            if event.kind == EventKind::Slot {
                cursor = usize::try_from(event.value)
                    .ok()
                    .filter(|slot| *slot < MAX_SLOTS);
                continue;
            }
            let Some(slot) = cursor else {
                continue;
            };
            let shadow = &mut self.slots[slot];

            match event.kind {
                EventKind::AbsX | EventKind::AbsY | EventKind::Pressure => {
                    match event.kind {
                        EventKind::AbsX => shadow.x = event.value,
                        EventKind::AbsY => shadow.y = event.value,
                        _ => shadow.pressure = event.value,
                    }
                    shadow.open.get_or_insert(RecordKind::Move);
                }
                EventKind::TrackingId => {
                    if let Some(kind) = shadow.open.take() {
                        records.push(shadow.record(kind, slot));
                    }
                    match (shadow.tracking_id, event.value) {
                        (Some(_), TRACKING_ID_LIFT) => {
                            records.push(shadow.record(RecordKind::Up, slot));
                            shadow.tracking_id = None;
                        }
                        (_, value) if value < 0 => {}
                        (Some(current), value) if current == value => {}
                        (Some(_), value) => {
                            records.push(shadow.record(RecordKind::Up, slot));
                            shadow.tracking_id = Some(value);
                            shadow.open = Some(RecordKind::Down);
                        }
                        (None, value) => {
                            shadow.tracking_id = Some(value);
                            shadow.open = Some(RecordKind::Down);
                        }
                    }
                }
                _ => {}
            }
        }

        for (slot, shadow) in self.slots.iter_mut().enumerate() {
            if let Some(kind) = shadow.open.take() {
                records.push(shadow.record(kind, slot));
            }
        }
        records
    }
}

/// Encodes a whole frame sequence into an in-memory trace. Fails on the
/// first frame the format cannot hold.
pub fn encode(frames: &[Frame]) -> io::Result<Vec<u8>> {
    let out = Vec::with_capacity(HEADER_LEN + frames.len() * (FRAME_HEADER_LEN + RECORD_LEN));
    let mut writer = TraceWriter::new(out);
    for frame in frames {
        writer.write_frame(frame)?;
    }
    writer.finish()
}
