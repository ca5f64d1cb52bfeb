use crate::output::{Buttons, OutputEvent, PointerReport};
use crate::sample::Sample;
use crate::settings::CursorSpeed;
use crate::tap::TapStatus;

/// Emits the pointer reports for one frame of the primary finger.
///
/// Screen Y grows downwards, so the surface delta is inverted. The first
/// frame of a contact carries no motion.
pub fn emit(
    last: &Sample,
    current: &Sample,
    status: TapStatus,
    speed: CursorSpeed,
    out: &mut Vec<OutputEvent>,
) {
    let (dx, dy) = if current.is_first {
        (0, 0)
    } else {
        let (prev, cur) = (last.primary(), current.primary());
        (cur.x - prev.x, -(cur.y - prev.y))
    };

    match status {
        TapStatus::Tap => {
            out.push(OutputEvent::Pointer(PointerReport {
                buttons: Buttons::LEFT,
                ..PointerReport::default()
            }));
            out.push(OutputEvent::Pointer(PointerReport::default()));
        }
        TapStatus::Hold => out.push(OutputEvent::Pointer(PointerReport {
            buttons: Buttons::LEFT,
            dx,
            dy,
            wheel: 0,
        })),
        TapStatus::Off => {
            let (dx, dy) = if current.count == 1 {
                (speed.scale(dx), speed.scale(dy))
            } else {
                (0, 0)
            };
            out.push(OutputEvent::Pointer(PointerReport {
                buttons: Buttons::NONE,
                dx,
                dy,
                wheel: 0,
            }));
        }
    }
}
