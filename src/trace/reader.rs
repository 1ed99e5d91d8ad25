use core::time::Duration;
use std::io::{self, Read};

use super::{RecordKind, FRAME_HEADER_LEN, HEADER_LEN, MAGIC, RECORD_LEN, VERSION};
use crate::{
    error::MalformedStreamError,
    event::{EventKind, Frame, RawEvent, TRACKING_ID_LIFT},
    tracker::MAX_SLOTS,
};

/// Forward-only trace decoder yielding one frame per item. The first error
/// ends the iteration.
pub struct TraceReader<R: Read> {
    reader: R,
    offset: u64,
    header_checked: bool,
    failed: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            header_checked: false,
            failed: false,
        }
    }

    fn read_header(&mut self) -> Result<(), MalformedStreamError> {
        let mut raw = [0u8; HEADER_LEN];
        if !self.fill(&mut raw, "header")? {
            return Err(MalformedStreamError::Truncated {
                what: "header",
                offset: 0,
            });
        }
        if &raw[0..8] != MAGIC {
            return Err(MalformedStreamError::Header("invalid magic".to_owned()));
        }
        let version = le_u32(&raw[8..12]);
        if version != VERSION {
            return Err(MalformedStreamError::Header(format!(
                "unsupported version {version}"
            )));
        }
        let frame_header_len = le_u32(&raw[12..16]);
        let record_len = le_u32(&raw[16..20]);
        if frame_header_len as usize != FRAME_HEADER_LEN || record_len as usize != RECORD_LEN {
            return Err(MalformedStreamError::Header(format!(
                "unsupported layout frame_header_len={frame_header_len} record_len={record_len}"
            )));
        }
        if le_u32(&raw[20..24]) != 0 {
            return Err(MalformedStreamError::InvalidField {
                field: "header.reserved",
                offset: 20,
            });
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, MalformedStreamError> {
        let frame_offset = self.offset;
        let mut raw = [0u8; FRAME_HEADER_LEN];
        if !self.fill(&mut raw, "frame header")? {
            return Ok(None);
        }
        let timestamp = Duration::from_micros(u64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ]));
        let record_count = u16::from_le_bytes([raw[8], raw[9]]);
        if u16::from_le_bytes([raw[10], raw[11]]) != 0 {
            return Err(MalformedStreamError::InvalidField {
                field: "frame.reserved",
                offset: frame_offset + 10,
            });
        }

        let mut events = Vec::with_capacity(usize::from(record_count) * 4);
        let mut cursor = 0u8;
        for _ in 0..record_count {
            let record_offset = self.offset;
            let mut rec = [0u8; RECORD_LEN];
            if !self.fill(&mut rec, "record")? {
                return Err(MalformedStreamError::Truncated {
                    what: "record",
                    offset: record_offset,
                });
            }
            let kind = RecordKind::from_u8(rec[0]).ok_or(MalformedStreamError::UnknownRecordKind {
                kind: rec[0],
                offset: record_offset,
            })?;
            let slot = rec[1];
            if usize::from(slot) >= MAX_SLOTS {
                return Err(MalformedStreamError::InvalidField {
                    field: "record.slot",
                    offset: record_offset + 1,
                });
            }
            if u16::from_le_bytes([rec[2], rec[3]]) != 0 {
                return Err(MalformedStreamError::InvalidField {
                    field: "record.reserved",
                    offset: record_offset + 2,
                });
            }
            let tracking_id = le_i32(&rec[4..8]);
            let x = le_i32(&rec[8..12]);
            let y = le_i32(&rec[12..16]);
            let pressure = le_i32(&rec[16..20]);
            if kind == RecordKind::Down && tracking_id < 0 {
                return Err(MalformedStreamError::InvalidField {
                    field: "record.tracking_id",
                    offset: record_offset + 4,
                });
            }

            if slot != cursor {
                events.push(RawEvent::new(EventKind::Slot, i32::from(slot), timestamp));
                cursor = slot;
            }
            let mut push = |kind, value| events.push(RawEvent::new(kind, value, timestamp));
            match kind {
                RecordKind::Down => {
                    push(EventKind::TrackingId, tracking_id);
                    push(EventKind::AbsX, x);
                    push(EventKind::AbsY, y);
                    push(EventKind::Pressure, pressure);
                }
                RecordKind::Move => {
                    push(EventKind::AbsX, x);
                    push(EventKind::AbsY, y);
                    push(EventKind::Pressure, pressure);
                }
                RecordKind::Up => push(EventKind::TrackingId, TRACKING_ID_LIFT),
            }
        }

        Ok(Some(Frame::new(events, timestamp)))
    }

    /// Fills `buf` completely. `Ok(false)` means the stream ended before the
    /// first byte; ending after it is a truncation.
    fn fill(&mut self, buf: &mut [u8], what: &'static str) -> Result<bool, MalformedStreamError> {
        let start = self.offset;
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(MalformedStreamError::Truncated {
                        what,
                        offset: start,
                    })
                }
                Ok(n) => {
                    filled += n;
                    self.offset += n as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<Frame, MalformedStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if !self.header_checked {
            self.header_checked = true;
            if let Err(err) = self.read_header() {
                self.failed = true;
                return Some(Err(err));
            }
        }
        match self.read_frame() {
            Ok(frame) => frame.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Decodes a complete in-memory trace.
pub fn decode(bytes: &[u8]) -> Result<Vec<Frame>, MalformedStreamError> {
    TraceReader::new(bytes).collect()
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
