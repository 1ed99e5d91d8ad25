//! Binary record/replay format for touch frames.
//!
//! A trace is a fixed header followed by frames. Each frame carries its sync
//! timestamp and one record per lifecycle step of a slot (down, move, up);
//! slot selection and sync events are rebuilt on decode.

mod reader;
mod writer;

pub use reader::{decode, TraceReader};
pub use writer::{encode, TraceWriter};

pub const MAGIC: &[u8; 8] = b"TAPTRACE";
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 24;
pub const FRAME_HEADER_LEN: usize = 12;
pub const RECORD_LEN: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Down = 1,
    Move = 2,
    Up = 3,
}

impl RecordKind {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Down),
            2 => Some(Self::Move),
            3 => Some(Self::Up),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRecord {
    pub kind: RecordKind,
    pub slot: u8,
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
}

impl SlotRecord {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0] = self.kind.as_u8();
        out[1] = self.slot;
        out[4..8].copy_from_slice(&self.tracking_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.x.to_le_bytes());
        out[12..16].copy_from_slice(&self.y.to_le_bytes());
        out[16..20].copy_from_slice(&self.pressure.to_le_bytes());
        out
    }
}

fn header_bytes() -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..8].copy_from_slice(MAGIC);
    out[8..12].copy_from_slice(&VERSION.to_le_bytes());
    out[12..16].copy_from_slice(&(FRAME_HEADER_LEN as u32).to_le_bytes());
    out[16..20].copy_from_slice(&(RECORD_LEN as u32).to_le_bytes());
    out
}
