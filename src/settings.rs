use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rotation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl CursorSpeed {
    pub fn scale(self, d: i32) -> i32 {
        match self {
            CursorSpeed::Slow => d / 2,
            CursorSpeed::Normal => d,
            CursorSpeed::Fast => d * 2,
        }
    }
}

impl FromStr for CursorSpeed {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" | "0" => Ok(CursorSpeed::Slow),
            "normal" | "1" => Ok(CursorSpeed::Normal),
            "fast" | "2" => Ok(CursorSpeed::Fast),
            other => Err(SettingsError::Unknown {
                knob: "cursor_speed",
                value: other.to_string(),
            }),
        }
    }
}

/// How a lone finger is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OneFingerMode {
    /// Pointer motion, taps and edge arrow keys.
    #[default]
    Relative,
    /// Absolute multitouch contact.
    Absolute,
}

impl FromStr for OneFingerMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" | "rel" | "0" => Ok(OneFingerMode::Relative),
            "absolute" | "abs" | "1" => Ok(OneFingerMode::Absolute),
            other => Err(SettingsError::Unknown {
                knob: "one_finger_mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("surface size {width}x{height} must be positive")]
    Surface { width: i32, height: i32 },
    #[error("screen size {width}x{height} must be positive")]
    Screen { width: i32, height: i32 },
    #[error("edge width {edge} leaves no interior on a {width}x{height} surface")]
    EdgeWidth { edge: i32, width: i32, height: i32 },
    #[error("unknown {knob} value '{value}'")]
    Unknown { knob: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: i32,
    pub height: i32,
    pub rotation: Rotation,
    pub rotation_enable: bool,
    pub edge_width: i32,
    pub cursor_speed: CursorSpeed,
    pub one_finger_mode: OneFingerMode,
    pub home_mode: bool,
    /// Screen the cursor anchor is given in.
    pub screen_width: i32,
    pub screen_height: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 640,
            rotation: Rotation::Deg270,
            rotation_enable: false,
            edge_width: crate::arrowkey::DEFAULT_EDGE_WIDTH,
            cursor_speed: CursorSpeed::Normal,
            one_finger_mode: OneFingerMode::Relative,
            home_mode: false,
            screen_width: 960,
            screen_height: 540,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(SettingsError::Surface {
                width: self.width,
                height: self.height,
            });
        }
        if self.screen_width <= 0 || self.screen_height <= 0 {
            return Err(SettingsError::Screen {
                width: self.screen_width,
                height: self.screen_height,
            });
        }
        let (w, h) = self.rotation.extent(self.width, self.height);
        if self.edge_width < 0 || self.edge_width * 2 >= w.min(h) {
            return Err(SettingsError::EdgeWidth {
                edge: self.edge_width,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_panel() {
        let s = Settings::default();
        assert_eq!((s.width, s.height), (1024, 640));
        assert_eq!(s.rotation, Rotation::Deg270);
        assert!(!s.rotation_enable);
        assert_eq!(s.edge_width, 120);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let s: Settings = toml::from_str("rotation = 90\ncursor_speed = \"fast\"").expect("parse");
        assert_eq!(s.rotation, Rotation::Deg90);
        assert_eq!(s.cursor_speed, CursorSpeed::Fast);
        assert_eq!(s.one_finger_mode, OneFingerMode::Relative);
        assert_eq!(s.width, 1024);
    }

    #[test]
    fn rejects_bad_rotation_in_toml() {
        assert!(toml::from_str::<Settings>("rotation = 45").is_err());
    }

    #[test]
    fn validate_catches_degenerate_values() {
        let s = Settings {
            width: 0,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::Surface { .. })));

        let s = Settings {
            edge_width: 320,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::EdgeWidth { .. })));

        let s = Settings {
            screen_height: -1,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::Screen { .. })));
    }

    #[test]
    fn knob_values_parse() {
        assert_eq!("FAST".parse::<CursorSpeed>(), Ok(CursorSpeed::Fast));
        assert_eq!("abs".parse::<OneFingerMode>(), Ok(OneFingerMode::Absolute));
        assert!("warp".parse::<CursorSpeed>().is_err());
    }

    #[test]
    fn speed_scaling() {
        assert_eq!(CursorSpeed::Fast.scale(-3), -6);
        assert_eq!(CursorSpeed::Slow.scale(5), 2);
        assert_eq!(CursorSpeed::Normal.scale(5), 5);
    }
}
