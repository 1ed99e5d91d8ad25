//! Linux `input_event` codec for 64-bit targets.

use core::time::Duration;
use std::{
    fs::File,
    io::{self, Read, Write},
    os::fd::AsFd,
    path::Path,
    thread,
    time::Instant,
};

use crate::{
    dispatch::OutputSink,
    error::MalformedStreamError,
    event::{EventKind, EventSource, RawEvent},
    gesture::GestureName,
};

pub const INPUT_EVENT_LEN: usize = 24;

pub fn encode_input_event(event: &RawEvent) -> [u8; INPUT_EVENT_LEN] {
    let (ev_type, code) = event.kind.codes();
    let sec = i64::try_from(event.timestamp.as_secs()).unwrap_or(i64::MAX);
    let usec = i64::from(event.timestamp.subsec_micros());

    let mut out = [0u8; INPUT_EVENT_LEN];
    out[0..8].copy_from_slice(&sec.to_le_bytes());
    out[8..16].copy_from_slice(&usec.to_le_bytes());
    out[16..18].copy_from_slice(&ev_type.to_le_bytes());
    out[18..20].copy_from_slice(&code.to_le_bytes());
    out[20..24].copy_from_slice(&event.value.to_le_bytes());
    out
}

pub fn decode_input_event(
    raw: &[u8; INPUT_EVENT_LEN],
    offset: u64,
) -> Result<RawEvent, MalformedStreamError> {
    let sec = le_i64(&raw[0..8]);
    let usec = le_i64(&raw[8..16]);
    let ev_type = u16::from_le_bytes([raw[16], raw[17]]);
    let code = u16::from_le_bytes([raw[18], raw[19]]);
    let value = i32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]);

    let sec = u64::try_from(sec).map_err(|_| MalformedStreamError::InvalidField {
        field: "tv_sec",
        offset,
    })?;
    let usec = u32::try_from(usec)
        .ok()
        .filter(|usec| *usec < 1_000_000)
        .ok_or(MalformedStreamError::InvalidField {
            field: "tv_usec",
            offset,
        })?;

    Ok(RawEvent::new(
        EventKind::from_codes(ev_type, code),
        value,
        Duration::from_secs(sec) + Duration::from_micros(u64::from(usec)),
    ))
}

fn le_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}

/// Event source reading `input_event` structs from a device node or any
/// other byte stream.
pub struct DeviceSource<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> DeviceSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }
}

impl<R: Read> EventSource for DeviceSource<R> {
    fn next_event(&mut self) -> Result<Option<RawEvent>, MalformedStreamError> {
        let mut raw = [0u8; INPUT_EVENT_LEN];
        let mut filled = 0;
        while filled < INPUT_EVENT_LEN {
            match self.reader.read(&mut raw[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(MalformedStreamError::Truncated {
                        what: "input_event",
                        offset: self.offset,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        let event = decode_input_event(&raw, self.offset)?;
        self.offset += INPUT_EVENT_LEN as u64;
        log::trace!("input {:?} {} @{:?}", event.kind, event.value, event.timestamp);
        Ok(Some(event))
    }
}

/// Output sink writing `input_event` structs. A paced sink sleeps between
/// events so the receiver sees the sequence at its recorded speed.
pub struct DeviceSink<W> {
    writer: W,
    paced: bool,
}

impl<W: Write> DeviceSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            paced: false,
        }
    }

    pub fn paced(writer: W) -> Self {
        Self {
            writer,
            paced: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for DeviceSink<W> {
    fn emit(&mut self, name: GestureName, events: &[RawEvent]) -> io::Result<()> {
        let started = Instant::now();
        let origin = events.first().map(|event| event.timestamp).unwrap_or_default();
        for event in events {
            if self.paced {
                let due = event.timestamp.saturating_sub(origin);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    thread::sleep(wait);
                }
            }
            self.writer.write_all(&encode_input_event(event))?;
            if self.paced && event.is_sync() {
                self.writer.flush()?;
            }
        }
        self.writer.flush()?;
        log::debug!("wrote {} events for {name}", events.len());
        Ok(())
    }
}

const GRAB_ATTEMPTS: u32 = 10;
const GRAB_RETRY: Duration = Duration::from_millis(200);

/// Touch device held with `EVIOCGRAB`. While it lives the kernel delivers the
/// device's events, injected ones included, to this open file alone.
pub struct GrabbedDevice {
    device: evdev::Device,
}

impl GrabbedDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut device = evdev::Device::open(path)?;
        let mut attempt = 1;
        loop {
            match device.grab() {
                Ok(()) => break,
                Err(err) if err.kind() == io::ErrorKind::ResourceBusy && attempt < GRAB_ATTEMPTS => {
                    log::debug!("{} busy, retrying grab ({attempt}/{GRAB_ATTEMPTS})", path.display());
                    attempt += 1;
                    thread::sleep(GRAB_RETRY);
                }
                Err(err) => return Err(err),
            }
        }
        log::info!("grabbed {}", path.display());
        Ok(Self { device })
    }

    /// Another descriptor on the grabbed file, for reading or writing.
    pub fn handle(&self) -> io::Result<File> {
        Ok(File::from(self.device.as_fd().try_clone_to_owned()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{parse_frame, EV_ABS};

    fn bytes(events: &[RawEvent]) -> Vec<u8> {
        events.iter().flat_map(encode_input_event).collect()
    }

    #[test]
    fn input_event_layout_matches_the_kernel_struct() {
        let event = RawEvent::new(EventKind::AbsX, 300, Duration::from_micros(1_500_250));
        let raw = encode_input_event(&event);
        assert_eq!(&raw[0..8], &1i64.to_le_bytes());
        assert_eq!(&raw[8..16], &500_250i64.to_le_bytes());
        assert_eq!(&raw[16..18], &EV_ABS.to_le_bytes());
        assert_eq!(&raw[18..20], &0x35u16.to_le_bytes());
        assert_eq!(&raw[20..24], &300i32.to_le_bytes());
        assert_eq!(decode_input_event(&raw, 0).unwrap(), event);
    }

    #[test]
    fn source_yields_frames_from_a_byte_stream() {
        let ms = Duration::from_millis;
        let data = bytes(&[
            RawEvent::new(EventKind::TrackingId, 3, ms(10)),
            RawEvent::new(EventKind::Other { ev_type: 1, code: 330 }, 1, ms(10)),
            RawEvent::sync(ms(10)),
        ]);
        let mut source = DeviceSource::new(data.as_slice());
        let frame = parse_frame(&mut source).unwrap().unwrap();
        assert_eq!(frame.fields().len(), 2);
        assert_eq!(frame.fields()[1].kind, EventKind::Other { ev_type: 1, code: 330 });
        assert!(parse_frame(&mut source).unwrap().is_none());
    }

    #[test]
    fn partial_struct_is_truncated() {
        let mut data = bytes(&[RawEvent::sync(Duration::ZERO)]);
        data.extend_from_slice(&[0u8; 10]);
        let mut source = DeviceSource::new(data.as_slice());
        assert!(source.next_event().unwrap().is_some());
        assert!(matches!(
            source.next_event(),
            Err(MalformedStreamError::Truncated { offset: 24, .. })
        ));
    }

    #[test]
    fn sink_writes_every_event() {
        let events = [
            RawEvent::new(EventKind::AbsY, 9, Duration::from_millis(1)),
            RawEvent::sync(Duration::from_millis(1)),
        ];
        let mut sink = DeviceSink::new(Vec::new());
        sink.emit(GestureName::Top, &events).unwrap();
        assert_eq!(sink.into_inner(), bytes(&events));
    }

    #[test]
    fn regular_file_cannot_be_grabbed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(GrabbedDevice::open(file.path()).is_err());
    }
}
