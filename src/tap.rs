//! Single-finger tap and hold detection.
//!
//! Nothing is scheduled: the dispatcher polls [`TapDetector::detect`] once per
//! sample with the current time and the detector compares it against the
//! contact's start time.

use serde::Serialize;

use crate::geometry::Zone;

/// A release within this window of touch-down is a tap.
pub const TAP_WINDOW_MS: u64 = 250;
/// A motionless contact older than this is a hold.
pub const HOLD_ARM_MS: u64 = 150;
/// Squared travel beyond which the contact counts as moved.
pub const MOVE_THRESHOLD_SQ: i64 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapPhase {
    #[default]
    None,
    WaitRelease,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapStatus {
    #[default]
    Off,
    Tap,
    Hold,
}

#[derive(Debug, Clone)]
pub struct TapDetector {
    phase: TapPhase,
    start_ms: u64,
    start_x: i32,
    start_y: i32,
    finger_moved: bool,
    held: bool,
    enabled: bool,
}

impl Default for TapDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TapDetector {
    pub fn new() -> Self {
        Self {
            phase: TapPhase::None,
            start_ms: 0,
            start_x: 0,
            start_y: 0,
            finger_moved: false,
            held: false,
            enabled: true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Re-enabling always starts from a clean state.
    pub fn enable(&mut self, on: bool) {
        self.enabled = on;
        if on {
            self.reset();
        }
    }

    pub fn phase(&self) -> TapPhase {
        self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn detect(&mut self, fingers: usize, x: i32, y: i32, zone: Zone, now_ms: u64) -> TapStatus {
        if fingers >= 2 {
            self.reset();
            return TapStatus::Off;
        }
        if !self.enabled {
            return TapStatus::Off;
        }

        match self.phase {
            TapPhase::None | TapPhase::Finished => {
                if fingers != 0 {
                    self.phase = TapPhase::WaitRelease;
                    self.start_ms = now_ms;
                    self.start_x = x;
                    self.start_y = y;
                } else {
                    self.reset();
                }
                TapStatus::Off
            }
            TapPhase::WaitRelease => {
                let elapsed = now_ms.saturating_sub(self.start_ms);
                if fingers == 0 {
                    let tapped = elapsed <= TAP_WINDOW_MS && !self.finger_moved && !self.held;
                    self.reset();
                    if tapped {
                        self.phase = TapPhase::Finished;
                        return TapStatus::Tap;
                    }
                    return TapStatus::Off;
                }

                if elapsed <= HOLD_ARM_MS {
                    // travel inside an edge band belongs to the arrow keys
                    if !self.finger_moved && zone.is_none() {
                        let dx = (x - self.start_x) as i64;
                        let dy = (y - self.start_y) as i64;
                        if dx * dx + dy * dy > MOVE_THRESHOLD_SQ {
                            self.finger_moved = true;
                        }
                    }
                    TapStatus::Off
                } else if !self.finger_moved {
                    self.held = true;
                    TapStatus::Hold
                } else {
                    TapStatus::Off
                }
            }
        }
    }
}
