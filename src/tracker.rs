//! Per-slot multitouch tracking folded into raw controller samples.

use elantp::RawSample;
use elantp::sample::{MAX_FINGERS, RAW_SCALE};

pub const SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x: i32,
    y: i32,
    /// Order the contact landed in; the two oldest contacts are reported.
    landed: u64,
    active: bool,
}

#[derive(Debug)]
pub struct Tracker {
    slots: [SlotState; SLOTS],
    cur_slot: usize,
    // device axis ranges
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
    // controller ranges the engine expects
    out_x: i32,
    out_y: i32,
    landings: u64,
}

impl Tracker {
    /// `width`/`height` are the engine's surface size.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            slots: [SlotState::default(); SLOTS],
            cur_slot: 0,
            x_min: 0,
            x_max: 4096,
            y_min: 0,
            y_max: 4096,
            out_x: width * RAW_SCALE,
            out_y: height * RAW_SCALE,
            landings: 0,
        }
    }

    pub fn set_ranges(&mut self, x_min: i32, x_max: i32, y_min: i32, y_max: i32) {
        self.x_min = x_min;
        self.x_max = x_max.max(x_min + 1);
        self.y_min = y_min;
        self.y_max = y_max.max(y_min + 1);
    }

    pub fn set_surface(&mut self, width: i32, height: i32) {
        self.out_x = width * RAW_SCALE;
        self.out_y = height * RAW_SCALE;
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, SLOTS as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            s.tracking_id = -1;
            s.active = false;
        } else if !s.active || s.tracking_id != tracking_id {
            self.landings += 1;
            *s = SlotState {
                tracking_id,
                x: s.x,
                y: s.y,
                landed: self.landings,
                active: true,
            };
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        self.slots[self.cur_slot].x = raw;
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        self.slots[self.cur_slot].y = raw;
    }

    fn scale(v: i32, min: i32, max: i32, out: i32) -> i32 {
        let v = i64::from(v.clamp(min, max) - min);
        (v * i64::from(out) / i64::from(max - min)) as i32
    }

    /// Snapshot at `SYN_REPORT`. More than two contacts are passed on as a
    /// count the engine rejects.
    pub fn on_syn_report(&self) -> RawSample {
        let mut act: Vec<&SlotState> = self
            .slots
            .iter()
            .filter(|s| s.active && s.tracking_id >= 0)
            .collect();
        act.sort_by_key(|s| s.landed);

        let mut sample = RawSample {
            count: act.len().min(u8::MAX as usize) as u8,
            ..RawSample::default()
        };
        for (point, s) in sample.fingers.iter_mut().zip(act.iter().take(MAX_FINGERS)) {
            point.x = Self::scale(s.x, self.x_min, self.x_max, self.out_x);
            point.y = Self::scale(s.y, self.y_min, self.y_max, self.out_y);
        }
        sample
    }
}
