//! Per-device dispatcher.
//!
//! [`TouchpadSession::process`] takes one raw sample at a time and returns
//! the events it produced. A continuous touch sequence is owned by exactly
//! one path: the pointer and tap path, the arrow-key path, or the absolute
//! contact path. Which one is decided by the first sample of the sequence.

use log::{debug, trace};

use crate::arrowkey::{ArrowInput, ArrowKeys};
use crate::clock::{Clock, MonotonicClock};
use crate::geometry::{self, Rotation, Zone};
use crate::gesture::{Admission, Gesture, TwoFingerClassifier};
use crate::mouse;
use crate::output::OutputEvent;
use crate::sample::{self, MAX_FINGERS, RawSample, Sample};
use crate::settings::{CursorSpeed, OneFingerMode, Settings};
use crate::tap::{TapDetector, TapStatus};
use crate::touch::{self, MtAnchor};
use crate::tracking;

/// Consecutive lower-count frames suppressed before one is believed.
pub const MAX_DROPPED: u32 = 1;
/// Frames skipped after the one-finger mode changes under a finger.
pub const MODE_CHANGE_SKIP: u32 = 3;

pub struct TouchpadSession<C: Clock = MonotonicClock> {
    settings: Settings,
    rotation: Rotation,
    pending_rotation: Rotation,
    clock: C,

    last: Sample,
    first: Sample,
    first_zone: Zone,
    dropped: u32,
    skip: u32,

    cursor: (i32, i32),
    anchor: MtAnchor,
    tap: TapDetector,
    arrows: ArrowKeys,
    gestures: TwoFingerClassifier,
}

impl TouchpadSession<MonotonicClock> {
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, MonotonicClock::new())
    }
}

impl<C: Clock> TouchpadSession<C> {
    pub fn with_clock(settings: Settings, clock: C) -> Self {
        let rotation = settings.rotation;
        Self {
            settings,
            rotation,
            pending_rotation: rotation,
            clock,
            last: Sample::default(),
            first: Sample::default(),
            first_zone: Zone::None,
            dropped: 0,
            skip: 0,
            cursor: (0, 0),
            anchor: MtAnchor::default(),
            tap: TapDetector::new(),
            arrows: ArrowKeys::new(),
            gestures: TwoFingerClassifier::new(),
        }
    }

    pub fn process(&mut self, raw: &RawSample) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        let count = raw.count as usize;
        if count > MAX_FINGERS {
            trace!("dropping sample with {count} fingers");
            return out;
        }

        if self.last.count == 0 && self.rotation != self.pending_rotation {
            debug!(
                "rotation {} -> {}",
                self.rotation.degrees(),
                self.pending_rotation.degrees()
            );
            self.rotation = self.pending_rotation;
        }

        if !self.debounce(count) {
            trace!("debounced {} -> {count} fingers", self.last.count);
            return out;
        }

        let (width, height) = (self.settings.width, self.settings.height);
        let mut current = sample::decode(raw, width, height, self.rotation);
        self.anchor.place(self.last.count, &mut current, self.cursor, height);

        let last_count = self.last.count;
        if last_count != count && count != 0 {
            current.is_first = true;
            self.tap.enable(true);
            self.skip = 0;
        }

        if count != 0 {
            tracking::track(&self.last, &mut current);
            if current.is_first {
                self.first = current.clone();
            }
            if self.skip > 0 {
                self.skip -= 1;
                trace!("skipped frame, {} left", self.skip);
                self.last = current;
                return out;
            }
        } else {
            tracking::smooth(&self.last, &mut current);
        }

        let (x0, y0) = (current.primary().x, current.primary().y);
        let mut zone = Zone::None;
        let mut status = TapStatus::Off;
        if count != 2 {
            zone = geometry::classify(
                self.rotation,
                self.settings.edge_width,
                width,
                height,
                x0,
                y0,
            );
            status = self.tap.detect(count, x0, y0, zone, self.clock.now_ms());
        }
        if current.is_first {
            self.first_zone = zone;
        }

        match count {
            0 => {
                if last_count == 1 && self.relative_pointer() {
                    let edge = !self.first_zone.is_none();
                    self.deliver_one_finger(&current, status, &mut out);
                    if edge {
                        self.arrows.release_all(&mut out);
                    }
                } else {
                    out.extend(touch::release_all(&self.last));
                }
                self.gestures.reset(&mut current);
            }
            1 if self.settings.home_mode => {
                if last_count == 2 {
                    out.extend(touch::release_missing(&self.last, &current));
                    self.gestures.clear_queue();
                }
                out.push(touch::report_home(&current, self.rotation, width, height));
            }
            1 => {
                if last_count == 2 {
                    out.extend(touch::release_all(&self.last));
                    self.gestures.clear_queue();
                }
                let mode = self.settings.one_finger_mode;
                match mode {
                    OneFingerMode::Relative if !self.first_zone.is_none() && zone.is_none() => {
                        debug!("contact left the {:?} band", self.first_zone);
                        self.first_zone = Zone::None;
                        self.arrows.release_all(&mut out);
                        self.tap.enable(false);
                        mouse::emit(
                            &self.last,
                            &current,
                            TapStatus::Off,
                            self.settings.cursor_speed,
                            &mut out,
                        );
                    }
                    OneFingerMode::Relative => self.deliver_one_finger(&current, status, &mut out),
                    OneFingerMode::Absolute => self.touch(&mut current, &mut out),
                }
            }
            _ => {
                out.extend(touch::release_missing(&self.last, &current));
                self.touch(&mut current, &mut out);
            }
        }

        self.last = current;
        out
    }

    /// Holds back a single frame whose finger count dropped without reaching zero.
    fn debounce(&mut self, count: usize) -> bool {
        if count != 0 && count < self.last.count && self.dropped < MAX_DROPPED {
            self.dropped += 1;
            return false;
        }
        self.dropped = 0;
        true
    }

    fn relative_pointer(&self) -> bool {
        self.settings.one_finger_mode == OneFingerMode::Relative && !self.settings.home_mode
    }

    fn deliver_one_finger(&mut self, current: &Sample, status: TapStatus, out: &mut Vec<OutputEvent>) {
        if self.first_zone.is_none() {
            mouse::emit(&self.last, current, status, self.settings.cursor_speed, out);
        } else {
            let input = ArrowInput {
                current,
                last: &self.last,
                pinned: self.first_zone,
                tap: status,
                rotation: self.rotation,
                width: self.settings.width,
                height: self.settings.height,
            };
            self.arrows.step(&input, out);
        }
    }

    /// Absolute contact path. Two-finger frames go through the gesture
    /// classifier and its start-of-contact queue.
    fn touch(&mut self, current: &mut Sample, out: &mut Vec<OutputEvent>) {
        let height = self.settings.height;
        let mut cardinality = current.count;

        if current.count == 2 {
            let gesture = self.gestures.classify(&self.last, current, &self.first);
            cardinality = gesture.finger_count();
            match self.gestures.admit(current, gesture) {
                Admission::Buffered => return,
                Admission::Replay(frames) => {
                    debug!("replaying {} frames as {gesture:?}", frames.len());
                    out.extend(frames.iter().map(|f| touch::report(f, cardinality, height)));
                }
                Admission::Live => {}
            }
        }

        out.push(touch::report(current, cardinality, height));
    }

    /// Requests a new orientation. Ignored unless rotation is enabled; takes
    /// effect once every finger has lifted.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        if !self.settings.rotation_enable {
            trace!("rotation change to {} ignored", rotation.degrees());
            return;
        }
        if rotation != self.pending_rotation {
            self.pending_rotation = rotation;
            self.skip = 0;
        }
        self.settings.rotation = rotation;
    }

    /// Sets both the active and pending rotation, bypassing the enable flag.
    pub fn restore_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        self.pending_rotation = rotation;
        self.settings.rotation = rotation;
    }

    pub fn set_rotation_enabled(&mut self, on: bool) {
        self.settings.rotation_enable = on;
    }

    pub fn set_cursor_speed(&mut self, speed: CursorSpeed) {
        self.settings.cursor_speed = speed;
    }

    pub fn set_edge_width(&mut self, edge_width: i32) {
        self.settings.edge_width = edge_width;
    }

    pub fn set_one_finger_mode(&mut self, mode: OneFingerMode) {
        if mode != self.settings.one_finger_mode && self.last.count > 0 {
            self.skip_samples(MODE_CHANGE_SKIP);
        }
        self.settings.one_finger_mode = mode;
    }

    pub fn set_home_mode(&mut self, on: bool) {
        self.settings.home_mode = on;
    }

    /// Cursor position in screen coordinates; two-finger contacts are
    /// centred on it.
    /// Out-of-screen positions are clamped to the surface.
    pub fn set_cursor_anchor(&mut self, x: i32, y: i32) {
        let scale = |v: i32, surface: i32, screen: i32| {
            let scaled = i64::from(v) * i64::from(surface) / i64::from(screen.max(1));
            scaled.clamp(0, i64::from(surface.max(0))) as i32
        };
        self.cursor = (
            scale(x, self.settings.width, self.settings.screen_width),
            scale(y, self.settings.height, self.settings.screen_height),
        );
    }

    /// Drops the next `n` non-empty frames of the current contact.
    pub fn skip_samples(&mut self, n: u32) {
        self.skip = n;
    }

    /// Applies a whole settings block the way the individual setters would.
    pub fn apply_settings(&mut self, settings: &Settings) {
        if settings.width != self.settings.width || settings.height != self.settings.height {
            debug!("surface {}x{}", settings.width, settings.height);
        }
        self.settings.width = settings.width;
        self.settings.height = settings.height;
        self.settings.screen_width = settings.screen_width;
        self.settings.screen_height = settings.screen_height;
        self.set_rotation_enabled(settings.rotation_enable);
        self.set_rotation(settings.rotation);
        self.set_cursor_speed(settings.cursor_speed);
        self.set_edge_width(settings.edge_width);
        self.set_one_finger_mode(settings.one_finger_mode);
        self.set_home_mode(settings.home_mode);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Orientation applied to the current sequence.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn pending_rotation(&self) -> Rotation {
        self.pending_rotation
    }

    pub fn cursor_anchor(&self) -> (i32, i32) {
        self.cursor
    }

    pub fn gesture(&self) -> Gesture {
        self.gestures.status()
    }

    pub fn last_sample(&self) -> &Sample {
        &self.last
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::output::{Buttons, PointerReport};

    fn session(settings: Settings) -> (TouchpadSession<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (TouchpadSession::with_clock(settings, clock.clone()), clock)
    }

    fn deg0() -> Settings {
        Settings {
            rotation: Rotation::Deg0,
            ..Settings::default()
        }
    }

    #[test]
    fn three_fingers_are_ignored() {
        let (mut s, _) = session(deg0());
        let raw = RawSample {
            count: 3,
            ..RawSample::default()
        };
        assert!(s.process(&raw).is_empty());
        assert_eq!(s.last_sample().count, 0);
    }

    #[test]
    fn pointer_moves_with_smoothing() {
        let (mut s, clock) = session(deg0());
        let first = s.process(&RawSample::one(2000, 1200));
        assert_eq!(first, vec![OutputEvent::Pointer(PointerReport::default())]);

        clock.advance(10);
        // surface (540, 300) smoothed against (500, 300) gives (510, 300)
        let out = s.process(&RawSample::one(2160, 1200));
        assert_eq!(
            out,
            vec![OutputEvent::Pointer(PointerReport {
                buttons: Buttons::NONE,
                dx: 10,
                dy: 0,
                wheel: 0
            })]
        );
    }

    #[test]
    fn dropped_finger_is_debounced_once() {
        let (mut s, clock) = session(deg0());
        s.set_one_finger_mode(OneFingerMode::Absolute);
        s.process(&RawSample::two((2000, 1200), (2800, 1200)));
        clock.advance(10);
        assert!(s.process(&RawSample::one(2000, 1200)).is_empty());
        assert_eq!(s.last_sample().count, 2);
        // the second one-finger frame is believed
        let out = s.process(&RawSample::one(2000, 1200));
        assert!(matches!(out[0], OutputEvent::Release { touch_up: true, .. }));
        assert_eq!(s.last_sample().count, 1);
    }

    #[test]
    fn skip_drops_frames_but_keeps_history() {
        let (mut s, _) = session(deg0());
        s.process(&RawSample::one(2000, 1200));
        s.skip_samples(2);
        assert!(s.process(&RawSample::one(2100, 1200)).is_empty());
        assert!(s.process(&RawSample::one(2200, 1200)).is_empty());
        assert_eq!(s.process(&RawSample::one(2200, 1200)).len(), 1);
    }

    #[test]
    fn mode_change_under_finger_skips_three() {
        let (mut s, _) = session(deg0());
        s.process(&RawSample::one(2000, 1200));
        s.set_one_finger_mode(OneFingerMode::Absolute);
        for _ in 0..MODE_CHANGE_SKIP {
            assert!(s.process(&RawSample::one(2000, 1200)).is_empty());
        }
        assert!(matches!(
            s.process(&RawSample::one(2000, 1200)).as_slice(),
            [OutputEvent::Contacts { .. }]
        ));
    }

    #[test]
    fn rotation_needs_enable() {
        let (mut s, _) = session(Settings::default());
        s.set_rotation(Rotation::Deg90);
        assert_eq!(s.pending_rotation(), Rotation::Deg270);

        s.set_rotation_enabled(true);
        s.set_rotation(Rotation::Deg90);
        assert_eq!(s.pending_rotation(), Rotation::Deg90);
        assert_eq!(s.rotation(), Rotation::Deg270);

        s.process(&RawSample::empty());
        assert_eq!(s.rotation(), Rotation::Deg90);

        s.restore_rotation(Rotation::Deg180);
        assert_eq!((s.rotation(), s.pending_rotation()), (Rotation::Deg180, Rotation::Deg180));
    }

    #[test]
    fn cursor_anchor_scales_from_screen() {
        let (mut s, _) = session(Settings::default());
        s.set_cursor_anchor(480, 270);
        assert_eq!(s.cursor_anchor(), (512, 320));

        s.set_cursor_anchor(3_000_000, -3_000_000);
        assert_eq!(s.cursor_anchor(), (1024, 0));
        s.set_cursor_anchor(i32::MAX, i32::MIN);
        assert_eq!(s.cursor_anchor(), (1024, 0));
    }

    #[test]
    fn home_mode_reports_raw_contact() {
        let (mut s, _) = session(deg0());
        s.set_home_mode(true);
        let out = s.process(&RawSample::one(2048, 1280));
        match out.as_slice() {
            [OutputEvent::Contacts { contacts }] => {
                assert_eq!((contacts[0].x, contacts[0].y), (512, 320));
            }
            other => panic!("unexpected {other:?}"),
        }
        // lifting goes through the absolute release
        let out = s.process(&RawSample::empty());
        assert_eq!(out, vec![OutputEvent::Release { slots: vec![0], touch_up: true }]);
    }

    #[test]
    fn leaving_the_edge_hands_over_to_the_pointer() {
        let (mut s, clock) = session(deg0());
        // lands in the left band
        s.process(&RawSample::one(200, 1200));
        clock.advance(200);
        let mut out = Vec::new();
        for x in [600, 1000, 1400, 1800, 2200] {
            out = s.process(&RawSample::one(x, 1200));
            if out.iter().any(OutputEvent::is_pointer) {
                break;
            }
        }
        assert_eq!(out.len(), 5);
        assert!(matches!(out[0], OutputEvent::Key { pressed: false, .. }));
        assert!(out[4].is_pointer());
    }
}
