use anyhow::Result;
use log::warn;

use crate::actions::{TouchSurface, UinputSink};
use elantp::OutputEvent;

/// Routes engine events to the virtual devices.
pub struct Outputs {
    sink: UinputSink,
    touch: Option<TouchSurface>,
    surface: (i32, i32),
}

impl Outputs {
    pub fn new(width: i32, height: i32) -> Self {
        let sink = UinputSink::new().unwrap_or_else(|e| {
            warn!("pointer device: {e}");
            UinputSink::noop()
        });
        Self {
            sink,
            touch: open_touch(width, height),
            surface: (width, height),
        }
    }

    /// Rebuilds the touch surface when its axis ranges change.
    pub fn resize(&mut self, width: i32, height: i32) {
        if self.surface != (width, height) {
            self.surface = (width, height);
            // drop first so the old device's contacts are gone before the new one appears
            self.touch = None;
            self.touch = open_touch(width, height);
        }
    }

    pub fn dispatch(&mut self, event: &OutputEvent) -> Result<()> {
        match event {
            OutputEvent::Pointer(report) => self.sink.pointer(report),
            OutputEvent::Key { key, pressed } => self.sink.key(*key, *pressed),
            OutputEvent::Contacts { contacts } => match self.touch.as_mut() {
                Some(t) => t.contacts(contacts),
                None => Ok(()),
            },
            OutputEvent::Release { slots, touch_up } => match self.touch.as_mut() {
                Some(t) => t.release(slots, *touch_up),
                None => Ok(()),
            },
        }
    }
}

fn open_touch(width: i32, height: i32) -> Option<TouchSurface> {
    match TouchSurface::new(width, height) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("touch surface unavailable, absolute contacts are dropped: {e}");
            None
        }
    }
}
