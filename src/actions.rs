//! Virtual output devices: a relative pointer/keyboard and a direct-touch surface.

use anyhow::{Result, anyhow};
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, EventType, InputEvent, KeyCode as EvKey, PropType,
    UinputAbsSetup, uinput::VirtualDevice,
};
use log::{info, warn};

use elantp::output::CONTACT_SIZE;
use elantp::{Contact, KeyCode, PointerReport};

pub const POINTER_DEVICE_NAME: &str = "elantp pointer";
pub const TOUCH_DEVICE_NAME: &str = "elantp touch";

/// Pointer, wheel and key output over `uinput`. Without `/dev/uinput` access it
/// runs as a no-op so the engine can still be exercised.
pub struct UinputSink {
    linux: Option<LinuxUinput>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        let dev = LinuxUinput::create()?;
        Ok(Self { linux: Some(dev) })
    }

    pub fn noop() -> Self {
        warn!("uinput not available; pointer output runs in NO-OP mode");
        Self { linux: None }
    }

    pub fn pointer(&mut self, report: &PointerReport) -> Result<()> {
        let Some(dev) = self.linux.as_mut() else {
            return Ok(());
        };
        dev.pointer(report)
    }

    pub fn key(&mut self, key: KeyCode, pressed: bool) -> Result<()> {
        let Some(dev) = self.linux.as_mut() else {
            return Ok(());
        };
        dev.key(key, pressed)
    }

    pub fn click(&mut self, which: &str) -> Result<()> {
        use elantp::Buttons;
        let buttons = match which.to_ascii_lowercase().as_str() {
            "left" => Buttons::LEFT,
            "right" => Buttons {
                right: true,
                ..Buttons::NONE
            },
            "middle" => Buttons {
                middle: true,
                ..Buttons::NONE
            },
            other => return Err(anyhow!("unknown mouse button: {other}")),
        };
        self.pointer(&PointerReport {
            buttons,
            ..PointerReport::default()
        })?;
        self.pointer(&PointerReport::default())
    }
}

fn uinput_key(key: KeyCode) -> uinput::event::keyboard::Key {
    use uinput::event::keyboard::Key as K;
    match key {
        KeyCode::Up => K::Up,
        KeyCode::Down => K::Down,
        KeyCode::Left => K::Left,
        KeyCode::Right => K::Right,
        KeyCode::Enter => K::Enter,
    }
}

struct LinuxUinput {
    dev: uinput::device::Device,
}

impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, keyboard, relative};

        let dev = uinput::default()?
            .name(POINTER_DEVICE_NAME)?
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            .event(keyboard::Key::Up)?
            .event(keyboard::Key::Down)?
            .event(keyboard::Key::Left)?
            .event(keyboard::Key::Right)?
            .event(keyboard::Key::Enter)?
            .create()?;

        info!("uinput: created {POINTER_DEVICE_NAME}");
        Ok(Self { dev })
    }

    fn pointer(&mut self, r: &PointerReport) -> Result<()> {
        use uinput::event::{controller::Mouse, relative};
        self.dev.send(Mouse::Left, i32::from(r.buttons.left))?;
        self.dev.send(Mouse::Right, i32::from(r.buttons.right))?;
        self.dev.send(Mouse::Middle, i32::from(r.buttons.middle))?;
        if r.dx != 0 {
            self.dev.send(relative::Position::X, r.dx)?;
        }
        if r.dy != 0 {
            self.dev.send(relative::Position::Y, r.dy)?;
        }
        if r.wheel != 0 {
            self.dev.send(relative::Wheel::Vertical, r.wheel)?;
        }
        self.dev.synchronize()?;
        Ok(())
    }

    fn key(&mut self, key: KeyCode, pressed: bool) -> Result<()> {
        self.dev.send(uinput_key(key), i32::from(pressed))?;
        self.dev.synchronize()?;
        Ok(())
    }
}

pub const MT_SLOTS: usize = 10;

fn abs(code: AbsoluteAxisCode, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE.0, code.0, value)
}

fn key_event(code: EvKey, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY.0, code.0, value)
}

/// Direct-touch multitouch device fed with absolute contacts.
pub struct TouchSurface {
    dev: VirtualDevice,
    tracking: [Option<i32>; MT_SLOTS],
    next_id: i32,
}

impl TouchSurface {
    pub fn new(width: i32, height: i32) -> Result<Self> {
        let axis = |code, max| UinputAbsSetup::new(code, AbsInfo::new(0, 0, max, 0, 0, 0));
        let keys = AttributeSet::from_iter([EvKey::BTN_TOUCH]);
        let props = AttributeSet::from_iter([PropType::DIRECT]);

        let dev = VirtualDevice::builder()?
            .name(TOUCH_DEVICE_NAME)
            .with_keys(&keys)?
            .with_properties(&props)?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_X, width))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_Y, height))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_SLOT, MT_SLOTS as i32 - 1))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_TRACKING_ID, i32::from(u16::MAX)))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_POSITION_X, width))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_POSITION_Y, height))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_TOUCH_MAJOR, CONTACT_SIZE * 5))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_TOUCH_MINOR, CONTACT_SIZE * 5))?
            .with_absolute_axis(&axis(AbsoluteAxisCode::ABS_MT_WIDTH_MAJOR, CONTACT_SIZE * 5))?
            .build()?;

        info!("uinput: created {TOUCH_DEVICE_NAME} ({width}x{height})");
        Ok(Self {
            dev,
            tracking: [None; MT_SLOTS],
            next_id: 0,
        })
    }

    pub fn contacts(&mut self, contacts: &[Contact]) -> Result<()> {
        let mut events = Vec::with_capacity(contacts.len() * 7 + 3);
        let mut landed = false;
        for c in contacts {
            let slot = c.slot as usize;
            if slot >= MT_SLOTS {
                warn!("contact slot {slot} out of range");
                continue;
            }
            events.push(abs(AbsoluteAxisCode::ABS_MT_SLOT, slot as i32));
            if self.tracking[slot].is_none() {
                let id = self.next_id;
                self.next_id = (self.next_id + 1) & 0xFFFF;
                self.tracking[slot] = Some(id);
                events.push(abs(AbsoluteAxisCode::ABS_MT_TRACKING_ID, id));
                landed = true;
            }
            events.push(abs(AbsoluteAxisCode::ABS_MT_POSITION_X, c.x));
            events.push(abs(AbsoluteAxisCode::ABS_MT_POSITION_Y, c.y));
            events.push(abs(AbsoluteAxisCode::ABS_MT_TOUCH_MAJOR, c.major));
            events.push(abs(AbsoluteAxisCode::ABS_MT_TOUCH_MINOR, c.major));
            events.push(abs(AbsoluteAxisCode::ABS_MT_WIDTH_MAJOR, c.major));
        }
        if let Some(first) = contacts.first() {
            events.push(abs(AbsoluteAxisCode::ABS_X, first.x));
            events.push(abs(AbsoluteAxisCode::ABS_Y, first.y));
        }
        if landed {
            events.push(key_event(EvKey::BTN_TOUCH, 1));
        }
        if events.is_empty() {
            return Ok(());
        }
        self.dev.emit(&events)?;
        Ok(())
    }

    pub fn release(&mut self, slots: &[u32], touch_up: bool) -> Result<()> {
        let mut events = Vec::with_capacity(slots.len() * 2 + 1);
        for &slot in slots {
            let slot = slot as usize;
            if slot >= MT_SLOTS || self.tracking[slot].take().is_none() {
                continue;
            }
            events.push(abs(AbsoluteAxisCode::ABS_MT_SLOT, slot as i32));
            events.push(abs(AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1));
        }
        if touch_up {
            events.push(key_event(EvKey::BTN_TOUCH, 0));
        }
        if events.is_empty() {
            return Ok(());
        }
        self.dev.emit(&events)?;
        Ok(())
    }
}
