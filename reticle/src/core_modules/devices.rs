// THEORY:
// The `devices` module defines the seams between the engine and the platform. The
// engine never talks to a window system, a screen grabber or an input injector
// directly; it talks to these traits, and a platform crate (or a replay tool, or a
// test) supplies the implementations.
//
// Key architectural principles:
// 1.  **Thin Contracts**: Each trait is exactly what the control loops call, nothing
//     more. Window discovery and focus policy stay on the implementor's side.
// 2.  **Loud Failure**: Every call returns `Result`. A capture or actuator failure
//     stops the loop; there is no retry here.
// 3.  **Shared Bookkeeping**: `ButtonLatch` carries the pressed-button rules every
//     actuator must honor, so implementations do not reinvent them.

use crate::core_modules::color::Frame;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Source of captured frames.
pub trait FrameSource {
    /// Brings the captured window to the foreground. Called once before a loop starts.
    fn focus_current_window(&mut self) -> Result<()>;

    /// Grabs one frame. Blocks until the frame is available.
    fn take_screenshot(&mut self) -> Result<Frame>;
}

/// A physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        };
        f.write_str(name)
    }
}

impl FromStr for MouseButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            _ => Err(Error::UnsupportedButton(s.to_string())),
        }
    }
}

/// Sink for simulated pointer input.
pub trait Actuator {
    /// Relative pointer displacement in device units.
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()>;

    fn press_button(&mut self, button: MouseButton) -> Result<()>;

    /// Fails with [`Error::ButtonNotPressed`] if `button` is not held.
    fn release_button(&mut self, button: MouseButton) -> Result<()>;

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.press_button(button)?;
        self.release_button(button)
    }
}

/// Tracks which buttons an actuator currently holds down.
#[derive(Debug, Default, Clone)]
pub struct ButtonLatch {
    pressed: HashSet<MouseButton>,
}

impl ButtonLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: MouseButton) {
        self.pressed.insert(button);
    }

    pub fn release(&mut self, button: MouseButton) -> Result<()> {
        if self.pressed.remove(&button) {
            Ok(())
        } else {
            Err(Error::ButtonNotPressed(button.to_string()))
        }
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.pressed.contains(&button)
    }
}

/// One command an actuator received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    MoveBy { dx: i32, dy: i32 },
    Press(MouseButton),
    Release(MouseButton),
}

/// An actuator that records commands instead of injecting input.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    latch: ButtonLatch,
    commands: Vec<ActuatorCommand>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[ActuatorCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<ActuatorCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clicks(&self, button: MouseButton) -> usize {
        self.commands
            .iter()
            .filter(|c| **c == ActuatorCommand::Release(button))
            .count()
    }
}

impl Actuator for RecordingActuator {
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.commands.push(ActuatorCommand::MoveBy { dx, dy });
        Ok(())
    }

    fn press_button(&mut self, button: MouseButton) -> Result<()> {
        self.latch.press(button);
        self.commands.push(ActuatorCommand::Press(button));
        Ok(())
    }

    fn release_button(&mut self, button: MouseButton) -> Result<()> {
        self.latch.release(button)?;
        self.commands.push(ActuatorCommand::Release(button));
        Ok(())
    }
}

/// A keyboard key the control loops can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Char(char),
    Backspace,
    Tab,
    Enter,
    Shift,
    Ctrl,
    Alt,
    Esc,
    Space,
    LeftArrow,
    UpArrow,
    RightArrow,
    DownArrow,
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let key = match upper.as_str() {
            "BACKSPACE" => Key::Backspace,
            "TAB" => Key::Tab,
            "ENTER" => Key::Enter,
            "SHIFT" => Key::Shift,
            "CTRL" => Key::Ctrl,
            "ALT" => Key::Alt,
            "ESC" => Key::Esc,
            "SPACE" => Key::Space,
            "LEFT_ARROW" => Key::LeftArrow,
            "UP_ARROW" => Key::UpArrow,
            "RIGHT_ARROW" => Key::RightArrow,
            "DOWN_ARROW" => Key::DownArrow,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c),
                    _ => return Err(Error::UnknownKey(s.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Backspace => f.write_str("BACKSPACE"),
            Key::Tab => f.write_str("TAB"),
            Key::Enter => f.write_str("ENTER"),
            Key::Shift => f.write_str("SHIFT"),
            Key::Ctrl => f.write_str("CTRL"),
            Key::Alt => f.write_str("ALT"),
            Key::Esc => f.write_str("ESC"),
            Key::Space => f.write_str("SPACE"),
            Key::LeftArrow => f.write_str("LEFT_ARROW"),
            Key::UpArrow => f.write_str("UP_ARROW"),
            Key::RightArrow => f.write_str("RIGHT_ARROW"),
            Key::DownArrow => f.write_str("DOWN_ARROW"),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Key> for String {
    fn from(k: Key) -> Self {
        k.to_string()
    }
}

/// Reports which keys are held right now.
pub trait KeySampler {
    fn held_keys(&mut self) -> Result<HashSet<Key>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_parse_case_insensitively() {
        assert_eq!("Left".parse::<MouseButton>().unwrap(), MouseButton::Left);
        assert_eq!("middle".parse::<MouseButton>().unwrap(), MouseButton::Middle);
        assert!(matches!("x1".parse::<MouseButton>(), Err(Error::UnsupportedButton(_))));
    }

    #[test]
    fn releasing_unpressed_button_fails() {
        let mut act = RecordingActuator::new();
        assert!(matches!(
            act.release_button(MouseButton::Right),
            Err(Error::ButtonNotPressed(_))
        ));
        act.press_button(MouseButton::Right).unwrap();
        act.release_button(MouseButton::Right).unwrap();
        assert!(act.release_button(MouseButton::Right).is_err());
    }

    #[test]
    fn latch_tracks_each_button_independently() {
        let mut latch = ButtonLatch::new();
        latch.press(MouseButton::Left);
        latch.press(MouseButton::Right);
        latch.release(MouseButton::Left).unwrap();
        assert!(!latch.is_pressed(MouseButton::Left));
        assert!(latch.is_pressed(MouseButton::Right));
        assert!(!latch.is_pressed(MouseButton::Middle));
    }

    #[test]
    fn click_is_press_then_release() {
        let mut act = RecordingActuator::new();
        act.click(MouseButton::Left).unwrap();
        assert_eq!(
            act.commands(),
            &[
                ActuatorCommand::Press(MouseButton::Left),
                ActuatorCommand::Release(MouseButton::Left)
            ]
        );
        assert_eq!(act.clicks(MouseButton::Left), 1);
    }

    #[test]
    fn keys_round_trip_through_names() {
        for name in ["Q", "7", "SHIFT", "esc", "left_arrow"] {
            let key: Key = name.parse().unwrap();
            assert_eq!(key.to_string().parse::<Key>().unwrap(), key);
        }
        assert_eq!("q".parse::<Key>().unwrap(), Key::Char('Q'));
        assert!(matches!("F13".parse::<Key>(), Err(Error::UnknownKey(_))));
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn keys_deserialize_from_strings() {
        let keys: Vec<Key> = serde_json::from_str(r#"["R", "SHIFT"]"#).unwrap();
        assert_eq!(keys, vec![Key::Char('R'), Key::Shift]);
        assert!(serde_json::from_str::<Key>(r#""NOPE""#).is_err());
    }
}
