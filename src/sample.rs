//! Raw hardware samples and their decoded, surface-space form.

use serde::{Deserialize, Serialize};

use crate::geometry::Rotation;
use crate::gesture::Gesture;

/// Fingers the engine tracks; samples reporting more are rejected.
pub const MAX_FINGERS: usize = 2;

/// Hardware units per surface unit.
pub const RAW_SCALE: i32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: i32,
    pub y: i32,
}

impl RawPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One poll of the hardware: the reported finger count plus up to two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub count: u8,
    pub fingers: [RawPoint; MAX_FINGERS],
}

impl RawSample {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn one(x: i32, y: i32) -> Self {
        Self {
            count: 1,
            fingers: [RawPoint::new(x, y), RawPoint::default()],
        }
    }

    pub fn two(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            count: 2,
            fingers: [RawPoint::new(a.0, a.1), RawPoint::new(b.0, b.1)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Finger {
    /// Stable contact identifier assigned by the tracker.
    pub slot: u32,
    pub x: i32,
    pub y: i32,
    /// Scaled but unclamped and unrotated position.
    pub raw_x: i32,
    pub raw_y: i32,
    /// Position handed to the absolute multitouch output.
    pub mt_x: i32,
    pub mt_y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    pub count: usize,
    pub fingers: [Finger; MAX_FINGERS],
    pub is_first: bool,
    pub gesture: Gesture,
}

impl Sample {
    pub fn active(&self) -> &[Finger] {
        &self.fingers[..self.count.min(MAX_FINGERS)]
    }

    pub fn primary(&self) -> &Finger {
        &self.fingers[0]
    }
}

/// Scales, clamps and rotates a raw sample into surface coordinates.
pub fn decode(raw: &RawSample, width: i32, height: i32, rotation: Rotation) -> Sample {
    let count = raw.count as usize;
    let mut sample = Sample {
        count,
        ..Sample::default()
    };

    for (finger, point) in sample
        .fingers
        .iter_mut()
        .zip(raw.fingers.iter())
        .take(count.min(MAX_FINGERS))
    {
        let x = point.x / RAW_SCALE;
        let y = point.y / RAW_SCALE;
        finger.raw_x = x;
        finger.raw_y = y;

        let (x, y) = rotation.apply(x.clamp(0, width), y.clamp(0, height), width, height);
        finger.x = x;
        finger.y = y;
        finger.mt_x = x;
        finger.mt_y = y;
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_scales_and_rotates() {
        let raw = RawSample::two((400, 200), (800, 1000));
        let s = decode(&raw, 1024, 640, Rotation::Deg0);
        assert_eq!(s.count, 2);
        assert_eq!((s.fingers[0].x, s.fingers[0].y), (100, 50));
        assert_eq!((s.fingers[1].x, s.fingers[1].y), (200, 250));

        let s = decode(&raw, 1024, 640, Rotation::Deg270);
        assert_eq!((s.fingers[0].x, s.fingers[0].y), (50, 924));
        assert_eq!((s.fingers[0].raw_x, s.fingers[0].raw_y), (100, 50));
    }

    #[test]
    fn decode_clamps_before_rotating() {
        let raw = RawSample::one(4095, 4095);
        let s = decode(&raw, 1024, 640, Rotation::Deg0);
        assert_eq!((s.fingers[0].x, s.fingers[0].y), (1023, 640));
        // raw keeps the unclamped value
        assert_eq!(s.fingers[0].raw_y, 1023);

        let s = decode(&RawSample::one(-40, 8), 1024, 640, Rotation::Deg180);
        assert_eq!((s.fingers[0].x, s.fingers[0].y), (1024, 638));
    }

    #[test]
    fn empty_sample_decodes_to_nothing() {
        let s = decode(&RawSample::empty(), 1024, 640, Rotation::Deg90);
        assert_eq!(s.count, 0);
        assert!(s.active().is_empty());
    }
}
