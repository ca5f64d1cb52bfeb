use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use elantp::{Clock, CursorSpeed, OneFingerMode, Rotation, Settings, TouchpadSession};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Where raw samples come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Kernel multitouch device. Picks the first one found when `device` is unset;
    /// `x_max`/`y_max` override the axis ranges the device reports.
    Evdev {
        #[serde(default)]
        device: Option<String>,
        #[serde(default)]
        x_max: Option<i32>,
        #[serde(default)]
        y_max: Option<i32>,
    },
    /// Character device delivering raw 14-byte controller reports.
    Packet { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Evdev {
            device: None,
            x_max: None,
            y_max: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub touchpad: Settings,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        self.touchpad.validate()?;
        if let SourceConfig::Evdev { x_max, y_max, .. } = &self.source {
            if x_max.is_some_and(|v| v <= 0) || y_max.is_some_and(|v| v <= 0) {
                return Err(anyhow!("source.x_max/y_max must be positive"));
            }
        }
        Ok(())
    }
}

/// A single runtime setting changed over the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    Rotation(Rotation),
    RotationEnable(bool),
    CursorSpeed(CursorSpeed),
    EdgeWidth(i32),
    OneFingerMode(OneFingerMode),
    HomeMode(bool),
    /// Cursor anchor in screen coordinates.
    Cursor(i32, i32),
}

pub const KNOBS: [&str; 7] = [
    "rotation",
    "rotation_enable",
    "cursor_speed",
    "edge_width",
    "one_finger_mode",
    "home_mode",
    "cursor",
];

fn parse_flag(knob: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        other => Err(anyhow!("{knob} expects on/off, got '{other}'")),
    }
}

impl Knob {
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let knob = match name {
            "rotation" => Knob::Rotation(value.parse()?),
            "rotation_enable" => Knob::RotationEnable(parse_flag(name, value)?),
            "cursor_speed" => Knob::CursorSpeed(value.parse()?),
            "edge_width" => Knob::EdgeWidth(
                value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("edge_width expects an integer, got '{value}'"))?,
            ),
            "one_finger_mode" => Knob::OneFingerMode(OneFingerMode::from_str(value)?),
            "home_mode" => Knob::HomeMode(parse_flag(name, value)?),
            "cursor" => {
                let (x, y) = value
                    .split_once(',')
                    .ok_or_else(|| anyhow!("cursor expects x,y, got '{value}'"))?;
                let coord = |s: &str| {
                    s.trim()
                        .parse::<i32>()
                        .map_err(|_| anyhow!("bad cursor coordinate '{s}'"))
                };
                Knob::Cursor(coord(x)?, coord(y)?)
            }
            other => {
                return Err(anyhow!(
                    "unknown knob '{other}' (expected one of: {})",
                    KNOBS.join(", ")
                ));
            }
        };
        Ok(knob)
    }

    /// Mirrors the knob into a settings block. The cursor anchor has no
    /// settings counterpart.
    pub fn apply_to(&self, settings: &mut Settings) {
        match *self {
            Knob::Rotation(r) => settings.rotation = r,
            Knob::RotationEnable(on) => settings.rotation_enable = on,
            Knob::CursorSpeed(s) => settings.cursor_speed = s,
            Knob::EdgeWidth(w) => settings.edge_width = w,
            Knob::OneFingerMode(m) => settings.one_finger_mode = m,
            Knob::HomeMode(on) => settings.home_mode = on,
            Knob::Cursor(..) => {}
        }
    }

    /// Rejects a cursor anchor that lies off the configured screen.
    pub fn check_bounds(&self, settings: &Settings) -> Result<()> {
        if let Knob::Cursor(x, y) = *self {
            if !(0..=settings.screen_width).contains(&x) || !(0..=settings.screen_height).contains(&y) {
                return Err(anyhow!(
                    "cursor {x},{y} is outside the {}x{} screen",
                    settings.screen_width,
                    settings.screen_height
                ));
            }
        }
        Ok(())
    }

    pub fn apply<C: Clock>(&self, session: &mut TouchpadSession<C>) {
        match *self {
            Knob::Rotation(r) => session.set_rotation(r),
            Knob::RotationEnable(on) => session.set_rotation_enabled(on),
            Knob::CursorSpeed(s) => session.set_cursor_speed(s),
            Knob::EdgeWidth(w) => session.set_edge_width(w),
            Knob::OneFingerMode(m) => session.set_one_finger_mode(m),
            Knob::HomeMode(on) => session.set_home_mode(on),
            Knob::Cursor(x, y) => session.set_cursor_anchor(x, y),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_devices: Vec<String>,
}

fn config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .ok_or_else(|| anyhow!("cannot locate the home directory"))?
        .home_dir()
        .to_path_buf();
    Ok(home.join(".config").join("elantp"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;
        let detected_devices = detect_multitouch_devices();

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
            detected_devices,
        })
    }

    /// Re-reads the active profile. On failure the current one is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // parse first so a broken profile never becomes active
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let source_ok = match &self.profile.source {
            SourceConfig::Evdev { device: Some(d), .. } => Path::new(d).exists(),
            SourceConfig::Evdev { device: None, .. } => !self.detected_devices.is_empty(),
            SourceConfig::Packet { path } => path.exists(),
        };
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "source": self.profile.source,
            "source_present": source_ok,
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "devices": self.detected_devices,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    let path = dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn detect_multitouch_devices() -> Vec<String> {
    crate::input::discover_multitouch()
        .into_iter()
        .map(|d| format!("{} ({})", d.name, d.path))
        .collect()
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
