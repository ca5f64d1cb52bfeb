//! Finger identity across frames and the temporal smoothing that follows it.

use crate::sample::{Finger, Sample};

fn dist_sq(a: &Finger, b: &Finger) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

fn renumber(current: &mut Sample) {
    for (slot, finger) in current.fingers.iter_mut().take(current.count).enumerate() {
        finger.slot = slot as u32;
    }
}

/// Assigns slots to `current` given the previously processed sample.
pub fn assign_slots(previous: &Sample, current: &mut Sample) {
    let prev = &previous.fingers;
    match (previous.count, current.count) {
        (1, 1) => current.fingers[0].slot = prev[0].slot,
        (1, 2) => {
            // the finger nearer the old contact continues as slot 1
            let d0 = dist_sq(&current.fingers[0], &prev[0]);
            let d1 = dist_sq(&current.fingers[1], &prev[0]);
            let (a, b) = if d1 > d0 { (1, 0) } else { (0, 1) };
            current.fingers[0].slot = a;
            current.fingers[1].slot = b;
        }
        (2, 1) => {
            let d0 = dist_sq(&current.fingers[0], &prev[0]);
            let d1 = dist_sq(&current.fingers[0], &prev[1]);
            current.fingers[0].slot = if d0 > d1 { prev[1].slot } else { prev[0].slot };
        }
        (2, 2) => {
            let d11 = dist_sq(&current.fingers[0], &prev[0]);
            let d12 = dist_sq(&current.fingers[0], &prev[1]);
            let d21 = dist_sq(&current.fingers[1], &prev[0]);
            let d22 = dist_sq(&current.fingers[1], &prev[1]);

            let keep = d11 <= d21 && d12 >= d22;
            let swap = !keep && d11 >= d21 && d12 <= d22;
            if swap {
                current.fingers[0].slot = prev[1].slot;
                current.fingers[1].slot = prev[0].slot;
            } else {
                // ambiguous matrices keep the previous order
                current.fingers[0].slot = prev[0].slot;
                current.fingers[1].slot = prev[1].slot;
            }
        }
        (_, 0) => {}
        _ => renumber(current),
    }
}

/// Blends `current` towards `previous`.
///
/// Two-finger frames average X evenly but weight Y 3:1 towards the previous
/// frame; the asymmetry is kept as found on the hardware.
pub fn smooth(previous: &Sample, current: &mut Sample) {
    let last = previous.count;
    let now = current.count;

    if last == now && now == 1 {
        let p = &previous.fingers[0];
        let c = &mut current.fingers[0];
        c.x = (p.x * 3 + c.x) / 4;
        c.y = (p.y * 3 + c.y) / 4;
    } else if last == now && now > 1 {
        for p in previous.active() {
            for c in current.fingers.iter_mut().take(now) {
                if p.slot == c.slot {
                    c.x = (p.x * 2 + c.x * 2) / 4;
                    c.y = (p.y * 3 + c.y) / 4;
                }
            }
        }
    }

    if last != 0 && now == 0 {
        for (c, p) in current.fingers.iter_mut().zip(previous.active()) {
            c.x = p.x;
            c.y = p.y;
        }
    }
}

/// Slot assignment followed by smoothing. A fresh contact is only numbered.
pub fn track(previous: &Sample, current: &mut Sample) {
    if previous.count == 0 {
        renumber(current);
        return;
    }
    assign_slots(previous, current);
    smooth(previous, current);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(points: &[(u32, i32, i32)]) -> Sample {
        let mut s = Sample {
            count: points.len(),
            ..Sample::default()
        };
        for (f, &(slot, x, y)) in s.fingers.iter_mut().zip(points) {
            f.slot = slot;
            f.x = x;
            f.y = y;
        }
        s
    }

    fn slots(s: &Sample) -> Vec<u32> {
        s.active().iter().map(|f| f.slot).collect()
    }

    #[test]
    fn fresh_contact_is_numbered_in_order() {
        let mut cur = sample(&[(9, 10, 10), (9, 50, 50)]);
        track(&Sample::default(), &mut cur);
        assert_eq!(slots(&cur), vec![0, 1]);
        // no smoothing against an empty frame
        assert_eq!((cur.fingers[1].x, cur.fingers[1].y), (50, 50));
    }

    #[test]
    fn single_finger_keeps_slot_and_is_smoothed() {
        let prev = sample(&[(1, 100, 100)]);
        let mut cur = sample(&[(0, 140, 60)]);
        track(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![1]);
        assert_eq!((cur.fingers[0].x, cur.fingers[0].y), (110, 90));
    }

    #[test]
    fn second_finger_arrives() {
        let prev = sample(&[(0, 100, 100)]);

        // finger 0 is the old contact
        let mut cur = sample(&[(0, 102, 100), (0, 400, 300)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![1, 0]);

        // finger 1 is the old contact
        let mut cur = sample(&[(0, 400, 300), (0, 101, 99)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![0, 1]);

        // equidistant falls back to index order
        let mut cur = sample(&[(0, 90, 100), (0, 110, 100)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![0, 1]);
    }

    #[test]
    fn finger_leaves_keeps_nearest_slot() {
        let prev = sample(&[(0, 100, 100), (1, 500, 300)]);

        let mut cur = sample(&[(7, 495, 305)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![1]);

        let mut cur = sample(&[(7, 98, 101)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![0]);
    }

    #[test]
    fn two_fingers_follow_nearest_pairing() {
        let prev = sample(&[(0, 100, 100), (1, 500, 300)]);

        let mut cur = sample(&[(9, 105, 100), (9, 495, 300)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![0, 1]);

        // reported in swapped order
        let mut cur = sample(&[(9, 495, 300), (9, 105, 100)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![1, 0]);
    }

    #[test]
    fn ambiguous_pairing_keeps_previous_order() {
        let prev = sample(&[(1, 100, 100), (0, 200, 100)]);
        // both new fingers sit on the midpoint
        let mut cur = sample(&[(9, 150, 100), (9, 150, 100)]);
        assign_slots(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![1, 0]);
    }

    #[test]
    fn two_finger_filter_is_asymmetric() {
        let prev = sample(&[(0, 100, 100), (1, 300, 100)]);
        let mut cur = sample(&[(9, 120, 140), (9, 320, 180)]);
        track(&prev, &mut cur);
        assert_eq!(slots(&cur), vec![0, 1]);
        assert_eq!((cur.fingers[0].x, cur.fingers[0].y), (110, 110));
        assert_eq!((cur.fingers[1].x, cur.fingers[1].y), (310, 120));
    }

    #[test]
    fn release_inherits_previous_position() {
        let prev = sample(&[(0, 321, 123)]);
        let mut cur = Sample::default();
        smooth(&prev, &mut cur);
        assert_eq!((cur.fingers[0].x, cur.fingers[0].y), (321, 123));
        assert_eq!(cur.count, 0);
    }
}
