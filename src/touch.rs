//! Absolute multitouch contacts: placement, reporting and release.

use crate::geometry::Rotation;
use crate::output::{CONTACT_SIZE, Contact, OutputEvent};
use crate::sample::{Finger, Sample};

/// Offset that moves a two-finger contact under the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MtAnchor {
    shift_x: i32,
    shift_y: i32,
}

impl MtAnchor {
    /// Fills `mt_x`/`mt_y` of a two-finger frame. The shift is computed on the
    /// first frame of the contact so that the fingers' midpoint lands on
    /// `(cursor_x, height - cursor_y)`, then reused while both fingers stay.
    pub fn place(&mut self, last_count: usize, current: &mut Sample, cursor: (i32, i32), height: i32) {
        if current.count != 2 {
            return;
        }
        let (cx, cy) = (cursor.0, height - cursor.1);
        let [f0, f1] = &current.fingers;

        if last_count != 2 {
            let mx = (cx + f1.x + cx - f0.x) >> 1;
            let my = (cy + f1.y + cy - f0.y) >> 1;
            self.shift_x = cx - f0.x + cx - mx;
            self.shift_y = cy - f0.y + cy - my;
        }

        for f in current.fingers.iter_mut() {
            f.mt_x = f.x + self.shift_x;
            f.mt_y = f.y + self.shift_y;
        }
    }

    pub fn shift(&self) -> (i32, i32) {
        (self.shift_x, self.shift_y)
    }
}

fn contact(f: &Finger, x: i32, y: i32) -> Contact {
    Contact {
        slot: f.slot,
        x,
        y,
        major: CONTACT_SIZE,
    }
}

/// Reports `sample` as `cardinality` contacts. A two-finger frame collapsed
/// to one contact reports the finger holding slot 0.
pub fn report(sample: &Sample, cardinality: usize, height: i32) -> OutputEvent {
    let pick: Vec<&Finger> = if cardinality == 1 {
        let finger = if sample.count == 2 {
            sample
                .fingers
                .iter()
                .find(|f| f.slot == 0)
                .unwrap_or(&sample.fingers[0])
        } else {
            &sample.fingers[0]
        };
        vec![finger]
    } else {
        sample.active().iter().take(cardinality).collect()
    };

    OutputEvent::Contacts {
        contacts: pick
            .into_iter()
            .map(|f| contact(f, f.mt_x, height - f.mt_y))
            .collect(),
    }
}

/// Single-finger report straight from the unrotated raw position.
pub fn report_home(sample: &Sample, rotation: Rotation, width: i32, height: i32) -> OutputEvent {
    let f = sample.primary();
    let (rx, ry) = (f.raw_x, f.raw_y);
    let (x, y) = match rotation {
        Rotation::Deg0 => (rx, height - ry),
        Rotation::Deg180 => (width - rx, ry),
        Rotation::Deg90 => (width - ry * width / height, height - rx * height / width),
        Rotation::Deg270 => (ry * width / height, rx * height / width),
    };
    OutputEvent::Contacts {
        contacts: vec![contact(f, x, y)],
    }
}

/// Lifts slots present in `last` but gone from `current`.
pub fn release_missing(last: &Sample, current: &Sample) -> Option<OutputEvent> {
    if last.count <= current.count {
        return None;
    }
    let slots: Vec<u32> = last
        .active()
        .iter()
        .map(|f| f.slot)
        .filter(|slot| !current.active().iter().any(|f| f.slot == *slot))
        .collect();
    (!slots.is_empty()).then_some(OutputEvent::Release {
        slots,
        touch_up: false,
    })
}

/// Lifts every slot of `last` along with the touch flag.
pub fn release_all(last: &Sample) -> Option<OutputEvent> {
    if last.count == 0 {
        return None;
    }
    Some(OutputEvent::Release {
        slots: last.active().iter().map(|f| f.slot).collect(),
        touch_up: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two(a: (u32, i32, i32), b: (u32, i32, i32)) -> Sample {
        let mut s = Sample {
            count: 2,
            ..Sample::default()
        };
        for (f, (slot, x, y)) in s.fingers.iter_mut().zip([a, b]) {
            f.slot = slot;
            f.x = x;
            f.y = y;
            f.mt_x = x;
            f.mt_y = y;
        }
        s
    }

    #[test]
    fn anchor_centres_midpoint_on_cursor() {
        let mut anchor = MtAnchor::default();
        let mut s = two((0, 100, 100), (1, 300, 200));
        anchor.place(1, &mut s, (500, 240), 640);
        let mid_x = (s.fingers[0].mt_x + s.fingers[1].mt_x) / 2;
        let mid_y = (s.fingers[0].mt_y + s.fingers[1].mt_y) / 2;
        assert_eq!((mid_x, mid_y), (500, 400));

        // later frames keep the shift
        let shift = anchor.shift();
        let mut next = two((0, 110, 100), (1, 310, 200));
        anchor.place(2, &mut next, (0, 0), 640);
        assert_eq!(anchor.shift(), shift);
        assert_eq!(next.fingers[0].mt_x, 110 + shift.0);
    }

    #[test]
    fn collapsed_report_uses_slot_zero() {
        let s = two((1, 10, 10), (0, 20, 20));
        match report(&s, 1, 640) {
            OutputEvent::Contacts { contacts } => {
                assert_eq!(contacts, vec![Contact { slot: 0, x: 20, y: 620, major: 20 }]);
            }
            other => panic!("unexpected {other:?}"),
        }
        match report(&s, 2, 640) {
            OutputEvent::Contacts { contacts } => assert_eq!(contacts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn home_report_maps_raw_position() {
        let mut s = Sample {
            count: 1,
            ..Sample::default()
        };
        s.fingers[0].raw_x = 512;
        s.fingers[0].raw_y = 320;
        let contact_at = |r| match report_home(&s, r, 1024, 640) {
            OutputEvent::Contacts { contacts } => (contacts[0].x, contacts[0].y),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(contact_at(Rotation::Deg0), (512, 320));
        assert_eq!(contact_at(Rotation::Deg270), (512, 320));
        s.fingers[0].raw_x = 0;
        s.fingers[0].raw_y = 0;
        let contact_at = |r| match report_home(&s, r, 1024, 640) {
            OutputEvent::Contacts { contacts } => (contacts[0].x, contacts[0].y),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(contact_at(Rotation::Deg180), (1024, 0));
        assert_eq!(contact_at(Rotation::Deg90), (1024, 640));
    }

    #[test]
    fn releases() {
        let last = two((0, 0, 0), (1, 5, 5));
        let mut cur = Sample {
            count: 1,
            ..Sample::default()
        };
        cur.fingers[0].slot = 1;
        assert_eq!(
            release_missing(&last, &cur),
            Some(OutputEvent::Release { slots: vec![0], touch_up: false })
        );
        assert_eq!(release_missing(&cur, &last), None);

        assert_eq!(
            release_all(&last),
            Some(OutputEvent::Release { slots: vec![0, 1], touch_up: true })
        );
        assert_eq!(release_all(&Sample::default()), None);
    }
}
