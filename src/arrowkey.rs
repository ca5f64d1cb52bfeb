//! Directional keys synthesised from one-finger travel along an edge band.
//!
//! A contact that lands in an edge zone stays pinned to that zone until it
//! lifts. Travel of more than [`MOVE_GAP`] along the band selects a key;
//! the key is clicked when the finger lifts, or auto-repeated while the
//! finger rests in place.

use log::trace;

use crate::geometry::{self, Rotation, Zone};
use crate::output::{KeyCode, OutputEvent};
use crate::sample::Sample;
use crate::tap::TapStatus;

/// Edge band used when a corner contact is re-evaluated.
pub const DEFAULT_EDGE_WIDTH: i32 = 120;
/// Per-frame travel still counted as resting.
pub const HOLD_GAP: i32 = 2;
/// Travel from the start point that selects a key.
pub const MOVE_GAP: i32 = 15;
/// Resting frames before the first repeat.
pub const HOLD_COUNT: u32 = 20;
/// Must stay within `1..HOLD_COUNT`. Each repeat is a down and up in the
/// same frame, and the counter restarts one frame early, so repeats land
/// every `SCROLL_SPEED + 1` frames.
pub const SCROLL_SPEED: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrowStatus {
    #[default]
    Release,
    Hold,
    Move,
    Click,
}

/// What the synthesiser sees of one frame.
#[derive(Debug, Clone, Copy)]
pub struct ArrowInput<'a> {
    pub current: &'a Sample,
    pub last: &'a Sample,
    /// Zone the contact was pinned to when it landed.
    pub pinned: Zone,
    pub tap: TapStatus,
    pub rotation: Rotation,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ArrowKeys {
    start_x: i32,
    start_y: i32,
    distance_x: i32,
    distance_y: i32,
    key: Option<KeyCode>,
    status: ArrowStatus,
    last_status: ArrowStatus,
    generated: bool,
    /// Set once the finger moves again after resting; ends auto-repeat.
    break_hold: bool,
    hold_count: u32,
}

impl ArrowKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn key(&self) -> Option<KeyCode> {
        self.key
    }

    pub fn status(&self) -> ArrowStatus {
        self.status
    }

    /// Lifts every directional key regardless of state.
    pub fn release_all(&mut self, out: &mut Vec<OutputEvent>) {
        out.extend(KeyCode::ARROWS.iter().map(|&k| OutputEvent::key_up(k)));
        self.reset();
    }

    pub fn step(&mut self, input: &ArrowInput<'_>, out: &mut Vec<OutputEvent>) {
        let cur = input.current.primary();
        self.status = if input.current.count == 0 {
            ArrowStatus::Release
        } else {
            ArrowStatus::Move
        };

        if input.current.is_first {
            self.reset();
            self.start_x = cur.x;
            self.start_y = cur.y;
        } else if self.status == ArrowStatus::Move {
            if !self.generated {
                self.distance_x = cur.x - self.start_x;
                self.distance_y = cur.y - self.start_y;
            } else {
                let prev = input.last.primary();
                let dx = (cur.x - prev.x).abs();
                let dy = (cur.y - prev.y).abs();
                if dx <= HOLD_GAP && dy <= HOLD_GAP {
                    self.status = ArrowStatus::Hold;
                }
                if self.last_status == ArrowStatus::Hold && self.status == ArrowStatus::Move {
                    self.break_hold = true;
                }
            }
        }

        let band = if input.pinned.is_corner() {
            if input.tap == TapStatus::Tap && self.status == ArrowStatus::Release {
                self.status = ArrowStatus::Click;
                self.key = Some(KeyCode::Enter);
                self.generated = true;
                Zone::None
            } else {
                geometry::classify_edge(
                    input.rotation,
                    DEFAULT_EDGE_WIDTH,
                    input.width,
                    input.height,
                    cur.x,
                    cur.y,
                )
            }
        } else {
            input.pinned
        };

        match band {
            Zone::Left | Zone::Right => {
                if self.distance_y.abs() > MOVE_GAP {
                    let key = if self.distance_y < 0 { KeyCode::Down } else { KeyCode::Up };
                    self.select(key);
                }
            }
            Zone::Top | Zone::Bottom => {
                if self.distance_x.abs() > MOVE_GAP {
                    let key = if self.distance_x < 0 { KeyCode::Left } else { KeyCode::Right };
                    self.select(key);
                }
            }
            _ => {}
        }
        self.last_status = self.status;

        if self.generated {
            self.emit(out);
        }
    }

    fn select(&mut self, key: KeyCode) {
        self.key = Some(key);
        // travel that ended in a lift becomes a click
        if self.status == ArrowStatus::Release
            && matches!(self.last_status, ArrowStatus::Move | ArrowStatus::Hold)
        {
            self.status = ArrowStatus::Click;
        }
        self.generated = true;
    }

    fn emit(&mut self, out: &mut Vec<OutputEvent>) {
        let Some(key) = self.key else {
            return;
        };
        match self.status {
            ArrowStatus::Release => {
                trace!("arrow {key:?} released");
                out.push(OutputEvent::key_up(key));
                self.reset();
            }
            ArrowStatus::Hold if self.break_hold => out.push(OutputEvent::key_up(key)),
            ArrowStatus::Hold => {
                if self.hold_count == HOLD_COUNT {
                    out.push(OutputEvent::key_down(key));
                    self.hold_count = HOLD_COUNT + 1;
                }
                if self.hold_count < HOLD_COUNT {
                    self.hold_count += 1;
                } else {
                    out.push(OutputEvent::key_up(key));
                    self.hold_count = HOLD_COUNT - SCROLL_SPEED;
                }
            }
            ArrowStatus::Click => {
                trace!("arrow {key:?} clicked");
                out.push(OutputEvent::key_down(key));
                out.push(OutputEvent::key_up(key));
                self.reset();
            }
            ArrowStatus::Move => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rig {
        keys: ArrowKeys,
        last: Sample,
        pinned: Zone,
    }

    impl Rig {
        fn new(pinned: Zone) -> Self {
            Self {
                keys: ArrowKeys::new(),
                last: Sample::default(),
                pinned,
            }
        }

        fn frame(&mut self, count: usize, x: i32, y: i32, tap: TapStatus) -> Vec<OutputEvent> {
            let mut cur = Sample {
                count,
                is_first: count != 0 && self.last.count == 0,
                ..Sample::default()
            };
            cur.fingers[0].x = x;
            cur.fingers[0].y = y;
            let mut out = Vec::new();
            let input = ArrowInput {
                current: &cur,
                last: &self.last,
                pinned: self.pinned,
                tap,
                rotation: Rotation::Deg0,
                width: 1024,
                height: 640,
            };
            self.keys.step(&input, &mut out);
            self.last = cur;
            out
        }
    }

    #[test]
    fn swipe_down_left_edge_clicks_on_release() {
        let mut rig = Rig::new(Zone::Left);
        assert!(rig.frame(1, 50, 400, TapStatus::Off).is_empty());
        for y in [390, 370, 350, 330] {
            assert!(rig.frame(1, 50, y, TapStatus::Off).is_empty());
        }
        assert_eq!(rig.keys.key(), Some(KeyCode::Down));
        let out = rig.frame(0, 50, 330, TapStatus::Off);
        assert_eq!(out, vec![OutputEvent::key_down(KeyCode::Down), OutputEvent::key_up(KeyCode::Down)]);
        assert_eq!(rig.keys.key(), None);
    }

    #[test]
    fn short_travel_selects_nothing() {
        let mut rig = Rig::new(Zone::Bottom);
        rig.frame(1, 500, 50, TapStatus::Off);
        rig.frame(1, 510, 50, TapStatus::Off);
        assert!(rig.frame(0, 510, 50, TapStatus::Off).is_empty());
    }

    #[test]
    fn resting_finger_repeats() {
        let mut rig = Rig::new(Zone::Top);
        rig.frame(1, 300, 600, TapStatus::Off);
        rig.frame(1, 340, 600, TapStatus::Off);
        assert_eq!(rig.keys.key(), Some(KeyCode::Right));

        let mut events = Vec::new();
        for _ in 0..40 {
            events.extend(rig.frame(1, 340, 600, TapStatus::Off));
        }
        let downs = events.iter().filter(|e| **e == OutputEvent::key_down(KeyCode::Right)).count();
        let ups = events.iter().filter(|e| **e == OutputEvent::key_up(KeyCode::Right)).count();
        // first repeat after 20 resting frames, the next one 11 frames later
        assert_eq!(downs, 2);
        assert_eq!(ups, 2);
        assert_eq!(rig.keys.status(), ArrowStatus::Hold);
    }

    #[test]
    fn moving_after_rest_lifts_the_key() {
        let mut rig = Rig::new(Zone::Right);
        rig.frame(1, 1000, 100, TapStatus::Off);
        rig.frame(1, 1000, 140, TapStatus::Off);
        rig.frame(1, 1000, 140, TapStatus::Off);
        let out = rig.frame(1, 1000, 160, TapStatus::Off);
        assert!(out.is_empty());
        let out = rig.frame(1, 1000, 160, TapStatus::Off);
        assert_eq!(out, vec![OutputEvent::key_up(KeyCode::Up)]);
    }

    #[test]
    fn corner_tap_is_enter() {
        let mut rig = Rig::new(Zone::CornerLeftTop);
        rig.frame(1, 20, 620, TapStatus::Off);
        let out = rig.frame(0, 20, 620, TapStatus::Tap);
        assert_eq!(out, vec![OutputEvent::key_down(KeyCode::Enter), OutputEvent::key_up(KeyCode::Enter)]);
    }

    #[test]
    fn corner_travel_uses_current_edge() {
        let mut rig = Rig::new(Zone::CornerLeftBottom);
        rig.frame(1, 20, 20, TapStatus::Off);
        // sliding up out of the corner keeps the left band
        rig.frame(1, 20, 80, TapStatus::Off);
        assert_eq!(rig.keys.key(), Some(KeyCode::Up));
    }

    #[test]
    fn release_all_lifts_four_arrows() {
        let mut keys = ArrowKeys::new();
        let mut out = Vec::new();
        keys.release_all(&mut out);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|e| matches!(e, OutputEvent::Key { pressed: false, key } if *key != KeyCode::Enter)));
    }
}
