//! Input device discovery and raw sample sources (evdev 0.13.2 compatible)

use anyhow::{Result, anyhow};
use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};
use log::{info, warn};
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use elantp::RawSample;
use elantp::packet::{self, PACKET_LEN};

use crate::config::SourceConfig;
use crate::tracker::Tracker;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

fn is_multitouch(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    });
    has_abs && has_mt
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    let Ok(rd) = std::fs::read_dir("/dev/input") else {
        return out;
    };
    for e in rd.flatten() {
        let p = e.path();
        let is_event = p
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("event"));
        if !is_event {
            continue;
        }
        if let Ok(dev) = Device::open(&p) {
            // skip our own virtual touch surface
            if is_multitouch(&dev) && dev.name() != Some(crate::actions::TOUCH_DEVICE_NAME) {
                out.push(DeviceInfo {
                    path: p.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                });
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// Yields one [`RawSample`] per hardware frame.
pub trait SampleSource {
    fn describe(&self) -> String;

    /// Next completed frame, `None` when nothing is pending. An error means the
    /// source is gone.
    fn poll(&mut self) -> Result<Option<RawSample>>;

    /// Surface size changed; sources that scale into controller units follow it.
    fn set_surface(&mut self, _width: i32, _height: i32) {}
}

pub fn open_source(cfg: &SourceConfig, width: i32, height: i32) -> Result<Box<dyn SampleSource>> {
    match cfg {
        SourceConfig::Evdev {
            device,
            x_max,
            y_max,
        } => {
            let path = match device {
                Some(d) => d.clone(),
                None => discover_multitouch()
                    .into_iter()
                    .next()
                    .map(|d| d.path)
                    .ok_or_else(|| anyhow!("no multitouch devices detected"))?,
            };
            let src = EvdevSource::open(Path::new(&path), width, height, *x_max, *y_max)?;
            Ok(Box::new(src))
        }
        SourceConfig::Packet { path } => Ok(Box::new(PacketSource::open(path)?)),
    }
}

pub struct EvdevSource {
    path: String,
    dev: Device,
    tracker: Tracker,
    ready: VecDeque<RawSample>,
}

impl EvdevSource {
    pub fn open(
        path: &Path,
        width: i32,
        height: i32,
        x_max: Option<i32>,
        y_max: Option<i32>,
    ) -> Result<Self> {
        let mut dev =
            Device::open(path).map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
        if !is_multitouch(&dev) {
            return Err(anyhow!("{} is not a multitouch device", path.display()));
        }

        let mut tracker = Tracker::new(width, height);
        let (mut x_range, mut y_range) = ((0, 4096), (0, 4096));
        for (code, abs) in dev.get_absinfo()? {
            match code {
                AbsoluteAxisCode::ABS_MT_POSITION_X => x_range = (abs.minimum(), abs.maximum()),
                AbsoluteAxisCode::ABS_MT_POSITION_Y => y_range = (abs.minimum(), abs.maximum()),
                _ => {}
            }
        }
        let x_range = (x_range.0, x_max.unwrap_or(x_range.1));
        let y_range = (y_range.0, y_max.unwrap_or(y_range.1));
        tracker.set_ranges(x_range.0, x_range.1, y_range.0, y_range.1);

        dev.set_nonblocking(true)?;
        if let Err(e) = dev.grab() {
            warn!("could not grab {}: {e}; desktop will see raw touches too", path.display());
        }
        info!(
            "evdev source {} ({}), x {:?} y {:?}",
            path.display(),
            dev.name().unwrap_or("unknown"),
            x_range,
            y_range
        );

        Ok(Self {
            path: path.display().to_string(),
            dev,
            tracker,
            ready: VecDeque::new(),
        })
    }
}

impl SampleSource for EvdevSource {
    fn describe(&self) -> String {
        format!("evdev:{}", self.path)
    }

    fn poll(&mut self) -> Result<Option<RawSample>> {
        if let Some(s) = self.ready.pop_front() {
            return Ok(Some(s));
        }
        let events = match self.dev.fetch_events() {
            Ok(events) => events,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(anyhow!("{}: {e}", self.path)),
        };
        for ev in events {
            if ev.event_type() == EventType::ABSOLUTE {
                match ev.code() {
                    c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => self.tracker.on_slot(ev.value()),
                    c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                        self.tracker.on_tracking_id(ev.value())
                    }
                    c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                        self.tracker.on_pos_x(ev.value())
                    }
                    c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                        self.tracker.on_pos_y(ev.value())
                    }
                    _ => {}
                }
            } else if ev.event_type() == EventType::SYNCHRONIZATION
                && ev.code() == SynchronizationCode::SYN_REPORT.0
            {
                self.ready.push_back(self.tracker.on_syn_report());
            }
        }
        Ok(self.ready.pop_front())
    }

    fn set_surface(&mut self, width: i32, height: i32) {
        self.tracker.set_surface(width, height);
    }
}

/// Raw controller reports read from a character device on a helper thread.
pub struct PacketSource {
    path: PathBuf,
    rx: Receiver<RawSample>,
}

impl PacketSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
        let (tx, rx) = mpsc::channel();
        let name = path.display().to_string();
        thread::Builder::new()
            .name("packet-reader".into())
            .spawn(move || read_packets(file, &name, |s| tx.send(s).is_ok()))?;
        info!("packet source {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            rx,
        })
    }
}

/// Feeds decoded reports to `deliver` until the reader hits EOF or `deliver`
/// returns false. Malformed reports are logged and dropped.
fn read_packets(mut reader: impl Read, name: &str, mut deliver: impl FnMut(RawSample) -> bool) {
    let mut buf = [0u8; PACKET_LEN];
    loop {
        if let Err(e) = reader.read_exact(&mut buf) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                info!("{name}: end of stream");
            } else {
                warn!("{name}: read failed: {e}");
            }
            return;
        }
        match packet::parse(&buf) {
            Ok(sample) => {
                if !deliver(sample) {
                    return;
                }
            }
            Err(e) => warn!("{name}: dropping report: {e}"),
        }
    }
}

impl SampleSource for PacketSource {
    fn describe(&self) -> String {
        format!("packet:{}", self.path.display())
    }

    fn poll(&mut self) -> Result<Option<RawSample>> {
        match self.rx.try_recv() {
            Ok(s) => Ok(Some(s)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!("{}: packet stream closed", self.path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(count: u8, x: u16, y: u16) -> [u8; PACKET_LEN] {
        let mut b = [0u8; PACKET_LEN];
        b[1] = count << 6;
        b[2] = (x >> 8) as u8;
        b[3] = x as u8;
        b[5] = (y >> 8) as u8;
        b[6] = y as u8;
        b[13] = 0x01;
        b
    }

    #[test]
    fn packet_stream_skips_bad_reports() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&report(1, 0x123, 0x456));
        let mut bad = report(1, 10, 10);
        bad[13] = 0x00;
        stream.extend_from_slice(&bad);
        stream.extend_from_slice(&report(0, 0, 0));
        // trailing partial report is ignored
        stream.extend_from_slice(&[0u8; 5]);

        let mut got = Vec::new();
        read_packets(stream.as_slice(), "test", |s| {
            got.push(s);
            true
        });
        assert_eq!(got, vec![RawSample::one(0x123, 0x456), RawSample::empty()]);
    }

    #[test]
    fn packet_reader_stops_when_receiver_is_gone() {
        let stream: Vec<u8> = [report(1, 1, 1), report(1, 2, 2)].concat();
        let mut calls = 0;
        read_packets(stream.as_slice(), "test", |_| {
            calls += 1;
            false
        });
        assert_eq!(calls, 1);
    }
}
