//! Touchpad gesture engine for the ELAN EKT1059 two-finger touchpad.
//!
//! Raw hardware samples go in through [`TouchpadSession::process`], semantic
//! input events ([`OutputEvent`]) come out. The engine does no I/O and keeps
//! all state inside the session, one session per physical device.

pub mod arrowkey;
pub mod clock;
pub mod geometry;
pub mod gesture;
pub mod mouse;
pub mod output;
pub mod packet;
pub mod sample;
pub mod session;
pub mod settings;
pub mod tap;
pub mod touch;
pub mod tracking;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use geometry::{Rotation, Zone};
pub use gesture::Gesture;
pub use output::{Buttons, Contact, KeyCode, OutputEvent, PointerReport};
pub use sample::{RawPoint, RawSample, Sample};
pub use session::TouchpadSession;
pub use settings::{CursorSpeed, OneFingerMode, Settings};
pub use tap::TapStatus;
