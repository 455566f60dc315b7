//! Declarative motion scripts.
//!
//! A [`Script`] is a list of [`ActionHandler`]s, each pairing a motor
//! selection with the actions to apply to it. Building performs no I/O and
//! no validation: names and values are checked when the script runs.

use crate::error::{PoppyError, Result};
use crate::motor::LedColor;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// MotorSelector
// ---------------------------------------------------------------------------

/// Motors targeted by an [`ActionHandler`].
///
/// `All` is resolved against the robot's motor list each time a script runs.
/// Serialized as the string `all` or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectorRepr", into = "SelectorRepr")]
pub enum MotorSelector {
    All,
    Named(Vec<String>),
}

impl Default for MotorSelector {
    fn default() -> Self {
        MotorSelector::Named(Vec::new())
    }
}

impl MotorSelector {
    /// Any name equal to `all` selects every motor.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.iter().any(|n| n == "all") {
            MotorSelector::All
        } else {
            MotorSelector::Named(names)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MotorSelector::Named(names) if names.is_empty())
    }
}

/// Parses `all` or a comma separated list of names.
impl std::str::FromStr for MotorSelector {
    type Err = PoppyError;

    fn from_str(s: &str) -> Result<Self> {
        let names: Vec<&str> = s.split(',').map(str::trim).collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(PoppyError::InvalidSelector(s.to_string()));
        }
        Ok(MotorSelector::from_names(names))
    }
}

impl From<&str> for MotorSelector {
    fn from(name: &str) -> Self {
        MotorSelector::from_names([name])
    }
}

impl From<String> for MotorSelector {
    fn from(name: String) -> Self {
        MotorSelector::from_names([name])
    }
}

impl<S: Into<String>> From<Vec<S>> for MotorSelector {
    fn from(names: Vec<S>) -> Self {
        MotorSelector::from_names(names)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for MotorSelector {
    fn from(names: [S; N]) -> Self {
        MotorSelector::from_names(names)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    One(String),
    Many(Vec<String>),
}

impl From<SelectorRepr> for MotorSelector {
    fn from(repr: SelectorRepr) -> Self {
        match repr {
            SelectorRepr::One(name) => MotorSelector::from(name),
            SelectorRepr::Many(names) => MotorSelector::from_names(names),
        }
    }
}

impl From<MotorSelector> for SelectorRepr {
    fn from(selector: MotorSelector) -> Self {
        match selector {
            MotorSelector::All => SelectorRepr::One("all".to_string()),
            MotorSelector::Named(names) => SelectorRepr::Many(names),
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetLed {
        value: LedColor,
    },
    /// Absolute move, in degrees.
    Move {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default)]
        wait: bool,
    },
    /// Relative move, in degrees.
    Rotate {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default)]
        wait: bool,
    },
    SetSpeed {
        value: u16,
    },
    SetCompliant {
        value: bool,
    },
    /// Pause, in seconds. Runs once whatever the selection.
    Wait {
        value: f64,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetLed { .. } => "set_led",
            Action::Move { .. } => "move",
            Action::Rotate { .. } => "rotate",
            Action::SetSpeed { .. } => "set_speed",
            Action::SetCompliant { .. } => "set_compliant",
            Action::Wait { .. } => "wait",
        }
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Optional parameters of a move: a number is the duration in seconds, a
/// bool is the wait flag, a pair sets both.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub duration: Option<f64>,
    pub wait: bool,
}

impl From<f64> for Motion {
    fn from(duration: f64) -> Self {
        Motion {
            duration: Some(duration),
            wait: false,
        }
    }
}

impl From<bool> for Motion {
    fn from(wait: bool) -> Self {
        Motion {
            duration: None,
            wait,
        }
    }
}

impl From<(f64, bool)> for Motion {
    fn from((duration, wait): (f64, bool)) -> Self {
        Motion {
            duration: Some(duration),
            wait,
        }
    }
}

impl From<Option<f64>> for Motion {
    fn from(duration: Option<f64>) -> Self {
        Motion {
            duration,
            wait: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionHandler {
    pub motors: MotorSelector,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl ActionHandler {
    pub fn new(motors: MotorSelector) -> Self {
        Self {
            motors,
            actions: Vec::new(),
        }
    }
}

/// Ordered motor selections and their actions. Never holds zero handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ActionHandler>", into = "Vec<ActionHandler>")]
pub struct Script {
    handlers: Vec<ActionHandler>,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<ActionHandler>> for Script {
    fn from(handlers: Vec<ActionHandler>) -> Self {
        if handlers.is_empty() {
            Script::new()
        } else {
            Script { handlers }
        }
    }
}

impl From<Script> for Vec<ActionHandler> {
    fn from(script: Script) -> Self {
        script.handlers
    }
}

impl Script {
    /// Script with an empty selection; call [`Script::select`] next.
    pub fn new() -> Self {
        Self::with_motors(MotorSelector::default())
    }

    pub fn with_motors(motors: impl Into<MotorSelector>) -> Self {
        Script {
            handlers: vec![ActionHandler::new(motors.into())],
        }
    }

    /// Load a script file: `.json` files are JSON, anything else YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let script = if is_json {
            serde_json::from_str(&data)?
        } else {
            serde_yaml::from_str(&data)?
        };
        Ok(script)
    }

    pub fn handlers(&self) -> &[ActionHandler] {
        &self.handlers
    }

    /// Later actions apply to `motors`. Replaces the current selection when
    /// it is still empty, starts a new handler otherwise.
    pub fn select(mut self, motors: impl Into<MotorSelector>) -> Self {
        let motors = motors.into();
        match self.handlers.last_mut() {
            Some(last) if last.motors.is_empty() => last.motors = motors,
            _ => self.handlers.push(ActionHandler::new(motors)),
        }
        self
    }

    pub fn led(self, color: LedColor) -> Self {
        self.push(Action::SetLed { value: color })
    }

    /// Raw `moving_speed`, 0..=1023 (0 is the fastest).
    pub fn speed(self, value: u16) -> Self {
        self.push(Action::SetSpeed { value })
    }

    pub fn compliant(self) -> Self {
        self.push(Action::SetCompliant { value: true })
    }

    pub fn stiff(self) -> Self {
        self.push(Action::SetCompliant { value: false })
    }

    pub fn goto(self, position: f64, motion: impl Into<Motion>) -> Self {
        let Motion { duration, wait } = motion.into();
        self.push(Action::Move {
            value: position,
            duration,
            wait,
        })
    }

    pub fn rotate(self, angle: f64, motion: impl Into<Motion>) -> Self {
        let Motion { duration, wait } = motion.into();
        self.push(Action::Rotate {
            value: angle,
            duration,
            wait,
        })
    }

    pub fn wait(self, seconds: f64) -> Self {
        self.push(Action::Wait { value: seconds })
    }

    fn push(mut self, action: Action) -> Self {
        match self.handlers.last_mut() {
            Some(last) => last.actions.push(action),
            None => self.handlers.push(ActionHandler {
                motors: MotorSelector::default(),
                actions: vec![action],
            }),
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
