//! Semantic events the engine hands to the host input layer.

use serde::Serialize;

/// Synthetic contact size reported for every absolute contact.
pub const CONTACT_SIZE: i32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Buttons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl Buttons {
    pub const NONE: Buttons = Buttons {
        left: false,
        right: false,
        middle: false,
    };
    pub const LEFT: Buttons = Buttons {
        left: true,
        right: false,
        middle: false,
    };
}

/// One synchronised relative pointer report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointerReport {
    pub buttons: Buttons,
    pub dx: i32,
    pub dy: i32,
    pub wheel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

impl KeyCode {
    pub const ARROWS: [KeyCode; 4] = [KeyCode::Down, KeyCode::Up, KeyCode::Left, KeyCode::Right];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub slot: u32,
    pub x: i32,
    pub y: i32,
    pub major: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Pointer(PointerReport),
    Key { key: KeyCode, pressed: bool },
    /// Absolute contacts of one frame, followed by a sync.
    Contacts { contacts: Vec<Contact> },
    /// Lift the listed slots; `touch_up` also clears the global touch flag.
    Release { slots: Vec<u32>, touch_up: bool },
}

impl OutputEvent {
    pub fn key_down(key: KeyCode) -> Self {
        OutputEvent::Key { key, pressed: true }
    }

    pub fn key_up(key: KeyCode) -> Self {
        OutputEvent::Key { key, pressed: false }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, OutputEvent::Pointer(_))
    }
}
