//! Run configuration.
//!
//! Every parameter struct is built once, validated once, and then handed to the
//! engine by value; nothing re-reads configuration mid-run.

use crate::core_modules::devices::{Key, MouseButton};
use crate::core_modules::geometry::AcquisitionBounds;
use crate::core_modules::pid::PidParams;
use crate::error::Result;
use crate::pipeline::ProcessingParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Keys the control loops react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// Held to authorize pointer corrections.
    pub engage: Key,
    /// Releasing it drops the current target.
    pub reset: Key,
    /// Pressing it ends the loop.
    pub quit: Key,
    /// Holding it ends the loop.
    pub emergency_stop: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            engage: Key::Shift,
            reset: Key::Char('R'),
            quit: Key::Char('Q'),
            emergency_stop: Key::Esc,
        }
    }
}

/// Everything a control loop needs, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub processing: ProcessingParams,
    pub yaw: PidParams,
    pub pitch: PidParams,
    pub acquisition: AcquisitionBounds,
    pub keys: KeyBindings,
    pub fire_button: FireButton,
}

/// Button the fire loop clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FireButton(pub MouseButton);

impl Default for FireButton {
    fn default() -> Self {
        FireButton(MouseButton::Left)
    }
}

impl Settings {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.processing.validate()?;
        self.yaw.validate()?;
        self.pitch.validate()?;
        Ok(())
    }
}
