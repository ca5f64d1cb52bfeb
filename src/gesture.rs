//! Two-finger gesture scoring and the short queue that delays emission
//! until a gesture has been recognised.

use log::debug;
use serde::Serialize;

use crate::sample::Sample;

/// Per-axis travel both fingers need before a frame counts as motion.
pub const NONMOVE_THRESHOLD: i32 = 7;
pub const FLICK_THRESHOLD: i32 = 10;
/// Change of squared finger separation that marks a pinch or spread.
pub const ZOOM_THRESHOLD: i64 = 15_000;
/// Frames buffered at the start of a two-finger contact.
pub const QUEUE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Zoom,
    FlickX,
    FlickY,
    #[default]
    Unmoved,
    OneMove,
}

impl Gesture {
    /// Contacts reported downstream while this gesture is active.
    pub fn finger_count(self) -> usize {
        if self == Gesture::Zoom { 2 } else { 1 }
    }

    pub fn is_flick(self) -> bool {
        matches!(self, Gesture::FlickX | Gesture::FlickY)
    }
}

/// What to do with a two-finger frame after queueing.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Held back; nothing is emitted yet.
    Buffered,
    /// The queue just filled with a moving gesture: emit these first.
    Replay(Vec<Sample>),
    Live,
}

#[derive(Debug, Default)]
pub struct TwoFingerClassifier {
    zoom: u32,
    flick_x: u32,
    flick_y: u32,
    one_move: u32,
    /// A flick, once chosen, holds for the rest of the contact.
    locked: Option<Gesture>,
    reference: Sample,
    queue: Vec<Sample>,
    queued: usize,
    status: Gesture,
}

impl TwoFingerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new two-finger contact with `current` as the reference.
    pub fn reset(&mut self, current: &mut Sample) {
        current.gesture = Gesture::Unmoved;
        self.zoom = 0;
        self.flick_x = 0;
        self.flick_y = 0;
        self.one_move = 0;
        self.locked = None;
        self.reference = current.clone();
        self.clear_queue();
        self.status = Gesture::Unmoved;
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.queued = 0;
    }

    pub fn status(&self) -> Gesture {
        self.status
    }

    /// Scores `current` and returns the gesture resolved so far.
    pub fn classify(&mut self, last: &Sample, current: &mut Sample, first: &Sample) -> Gesture {
        if last.count != 2 && current.count == 2 {
            self.reset(current);
        }

        let (dx0, dy0, dx1, dy1) = displacement(current, &self.reference);
        let moving = (dx0.abs() >= NONMOVE_THRESHOLD && dx1.abs() >= NONMOVE_THRESHOLD)
            || (dy0.abs() >= NONMOVE_THRESHOLD && dy1.abs() >= NONMOVE_THRESHOLD);

        if moving {
            let delta = (separation_sq(current) - separation_sq(&self.reference)).abs();
            let opposed = dx0 * dx1 < 0 || dy0 * dy1 < 0;

            if delta >= ZOOM_THRESHOLD && opposed {
                self.score_zoom(current);
            } else {
                let (dx0, dy0, dx1, dy1) = displacement(current, first);
                let same_x = dx0 * dx1 >= 0;
                let same_y = dy0 * dy1 >= 0;

                if !same_x && !same_y {
                    self.score_zoom(current);
                } else if same_x && dx0.abs() > dy0.abs() {
                    if dx0.abs() >= FLICK_THRESHOLD || dx1.abs() >= FLICK_THRESHOLD {
                        self.flick_x += 2;
                        self.one_move = 0;
                        current.gesture = Gesture::FlickX;
                    } else {
                        self.score_one_move(current);
                    }
                } else if same_y && dy0.abs() > dx0.abs() {
                    if dy0.abs() >= FLICK_THRESHOLD || dy1.abs() >= FLICK_THRESHOLD {
                        self.flick_y += 2;
                        self.one_move = 0;
                        current.gesture = Gesture::FlickY;
                    } else {
                        self.score_one_move(current);
                    }
                }
            }
            self.reference = current.clone();
        } else {
            current.gesture = Gesture::Unmoved;
        }

        self.status = self.resolve();
        self.status
    }

    /// Highest score wins; ties go to flick X, flick Y, zoom, one-move in that order.
    fn resolve(&mut self) -> Gesture {
        if let Some(locked) = self.locked {
            return locked;
        }

        let ranked = [
            (Gesture::FlickX, self.flick_x),
            (Gesture::FlickY, self.flick_y),
            (Gesture::Zoom, self.zoom),
            (Gesture::OneMove, self.one_move),
        ];
        let mut best = (Gesture::Unmoved, 0);
        for (gesture, score) in ranked {
            if score > best.1 {
                best = (gesture, score);
            }
        }

        if best.0.is_flick() {
            debug!("two-finger contact locked to {:?}", best.0);
            self.locked = Some(best.0);
        }
        best.0
    }

    fn score_zoom(&mut self, current: &mut Sample) {
        self.zoom += 1;
        self.one_move = 0;
        current.gesture = Gesture::Zoom;
    }

    fn score_one_move(&mut self, current: &mut Sample) {
        self.one_move += 1;
        current.gesture = Gesture::OneMove;
    }

    /// Queues the first frames of a contact; the frame that finds the queue
    /// full releases it when a moving gesture has been recognised.
    pub fn admit(&mut self, current: &Sample, gesture: Gesture) -> Admission {
        if self.queued < QUEUE_LEN {
            self.queue.push(current.clone());
            self.queued += 1;
            return Admission::Buffered;
        }

        let admission = if self.queued == QUEUE_LEN && gesture != Gesture::Unmoved {
            Admission::Replay(std::mem::take(&mut self.queue))
        } else {
            self.queue.clear();
            Admission::Live
        };
        self.queued += 1;
        admission
    }
}

fn displacement(current: &Sample, from: &Sample) -> (i32, i32, i32, i32) {
    let (c, f) = (&current.fingers, &from.fingers);
    (c[0].x - f[0].x, c[0].y - f[0].y, c[1].x - f[1].x, c[1].y - f[1].y)
}

fn separation_sq(s: &Sample) -> i64 {
    let dx = (s.fingers[1].x - s.fingers[0].x) as i64;
    let dy = (s.fingers[1].y - s.fingers[0].y) as i64;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two(a: (i32, i32), b: (i32, i32)) -> Sample {
        let mut s = Sample {
            count: 2,
            ..Sample::default()
        };
        s.fingers[0].x = a.0;
        s.fingers[0].y = a.1;
        s.fingers[1].slot = 1;
        s.fingers[1].x = b.0;
        s.fingers[1].y = b.1;
        s
    }

    /// Feeds frames as the dispatcher would and returns the resolved gestures.
    fn feed(frames: &[Sample]) -> Vec<Gesture> {
        let mut c = TwoFingerClassifier::new();
        let mut last = Sample::default();
        let first = frames[0].clone();
        let mut out = Vec::new();
        for f in frames {
            let mut cur = f.clone();
            out.push(c.classify(&last, &mut cur, &first));
            last = cur;
        }
        out
    }

    #[test]
    fn still_fingers_stay_unmoved() {
        let frames = vec![two((100, 100), (300, 100)); 5];
        assert!(feed(&frames).iter().all(|g| *g == Gesture::Unmoved));
    }

    #[test]
    fn spreading_fingers_zoom() {
        let frames: Vec<_> = (0..6)
            .map(|i| two((300 - 40 * i, 200), (500 + 40 * i, 200)))
            .collect();
        let out = feed(&frames);
        assert_eq!(out[0], Gesture::Unmoved);
        assert!(out[1..].iter().all(|g| *g == Gesture::Zoom));
    }

    #[test]
    fn parallel_swipe_flicks_and_locks() {
        let mut frames: Vec<_> = (0..4)
            .map(|i| two((100 + 20 * i, 200), (300 + 20 * i, 200)))
            .collect();
        // later pinching does not undo the lock
        frames.push(two((170, 200), (450, 200)));
        frames.push(two((140, 200), (480, 200)));
        let out = feed(&frames);
        assert_eq!(out[1], Gesture::FlickX);
        assert!(out[1..].iter().all(|g| *g == Gesture::FlickX));
    }

    #[test]
    fn vertical_swipe_flicks_y() {
        let frames: Vec<_> = (0..3)
            .map(|i| two((100, 100 + 15 * i), (300, 100 + 15 * i)))
            .collect();
        assert_eq!(feed(&frames)[2], Gesture::FlickY);
    }

    #[test]
    fn small_parallel_drift_is_one_move() {
        // 8 units sideways, above the motion floor but below the flick threshold
        let frames = vec![two((100, 100), (300, 100)), two((108, 100), (308, 100))];
        assert_eq!(feed(&frames)[1], Gesture::OneMove);
    }

    #[test]
    fn queue_holds_four_frames_then_replays() {
        let mut c = TwoFingerClassifier::new();
        let s = two((0, 0), (10, 10));
        for _ in 0..QUEUE_LEN {
            assert_eq!(c.admit(&s, Gesture::Zoom), Admission::Buffered);
        }
        match c.admit(&s, Gesture::Zoom) {
            Admission::Replay(frames) => assert_eq!(frames.len(), QUEUE_LEN),
            other => panic!("expected replay, got {other:?}"),
        }
        assert_eq!(c.admit(&s, Gesture::Zoom), Admission::Live);
    }

    #[test]
    fn unmoved_contact_skips_replay() {
        let mut c = TwoFingerClassifier::new();
        let s = two((0, 0), (10, 10));
        for _ in 0..QUEUE_LEN {
            c.admit(&s, Gesture::Unmoved);
        }
        assert_eq!(c.admit(&s, Gesture::Unmoved), Admission::Live);
        assert_eq!(c.admit(&s, Gesture::Zoom), Admission::Live);
    }
}
