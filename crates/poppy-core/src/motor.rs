use crate::descriptor::MotorDescriptor;
use crate::error::{PoppyError, Result};
use crate::paths;
use crate::request::{RegisterValue, Registers, RequestHandler};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Highest raw value of the `moving_speed` register. `0` means the same.
pub const MAX_SPEED: f64 = 1023.0;

/// Angular speed, in degrees per second, of one `moving_speed` unit.
pub const DEGREES_PER_SPEED_UNIT: f64 = 0.666;

/// Duration sent to goto endpoints when none is wanted; the firmware
/// rejects a zero duration.
pub(crate) const MIN_GOTO_DURATION: f64 = 0.001;

// ---------------------------------------------------------------------------
// LedColor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    #[default]
    Off,
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Pink,
    White,
}

impl LedColor {
    pub fn all() -> &'static [LedColor] {
        &[
            LedColor::Off,
            LedColor::Red,
            LedColor::Green,
            LedColor::Blue,
            LedColor::Yellow,
            LedColor::Cyan,
            LedColor::Pink,
            LedColor::White,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LedColor::Off => "off",
            LedColor::Red => "red",
            LedColor::Green => "green",
            LedColor::Blue => "blue",
            LedColor::Yellow => "yellow",
            LedColor::Cyan => "cyan",
            LedColor::Pink => "pink",
            LedColor::White => "white",
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LedColor {
    type Err = PoppyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LedColor::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PoppyError::InvalidLed(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DurationInput
// ---------------------------------------------------------------------------

/// Input of [`MotorHandle::compute_duration`]. Missing `start` and `speed`
/// are read from the motor registers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationInput {
    pub start: Option<f64>,
    pub end: f64,
    pub speed: Option<f64>,
}

impl DurationInput {
    pub fn to(end: f64) -> Self {
        Self {
            end,
            ..Default::default()
        }
    }
}

/// Seconds needed to travel from `start` to `end` at raw `speed`.
pub fn movement_duration(start: f64, end: f64, speed: f64) -> f64 {
    let speed = if speed == 0.0 { MAX_SPEED } else { speed };
    (start - end).abs() / (speed * DEGREES_PER_SPEED_UNIT)
}

/// Timer used for every client-side wait.
pub async fn wait_secs(seconds: f64) {
    let delay = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or_default();
    tokio::time::sleep(delay).await;
}

// ---------------------------------------------------------------------------
// MotorHandle
// ---------------------------------------------------------------------------

/// Register access and high-level moves for one named motor.
///
/// Angle limits are kept for display only; range checks belong to the firmware.
#[derive(Clone)]
pub struct MotorHandle {
    descriptor: MotorDescriptor,
    handler: Arc<dyn RequestHandler>,
}

impl fmt::Debug for MotorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorHandle")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl MotorHandle {
    pub fn new(descriptor: MotorDescriptor, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            descriptor,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &MotorDescriptor {
        &self.descriptor
    }

    // -----------------------------------------------------------------------
    // Raw register access
    // -----------------------------------------------------------------------

    /// Read registers; a register whose request failed maps to `None`.
    pub async fn get(&self, registers: &[&str]) -> Registers {
        self.handler.get_register(self.name(), registers).await
    }

    pub async fn get_register_value(&self, register: &str) -> Result<RegisterValue> {
        self.get(&[register])
            .await
            .remove(register)
            .flatten()
            .ok_or_else(|| PoppyError::MissingRegister {
                motor: self.name().to_string(),
                register: register.to_string(),
            })
    }

    pub(crate) async fn get_number(&self, register: &str) -> Result<f64> {
        let value = self.get_register_value(register).await?;
        value
            .as_f64()
            .ok_or_else(|| PoppyError::InvalidRegisterValue {
                register: register.to_string(),
                value: value.to_string(),
            })
    }

    pub async fn set(&self, register: &str, value: impl Into<RegisterValue>) -> Result<()> {
        self.handler
            .set_register(self.name(), register, value.into())
            .await
    }

    // -----------------------------------------------------------------------
    // Register shortcuts
    // -----------------------------------------------------------------------

    /// Set `moving_speed` (0..=1023, roughly 0.666 deg/s per unit, 0 = fastest).
    pub async fn set_speed(&self, speed: u16) -> Result<()> {
        self.set("moving_speed", speed).await
    }

    pub async fn set_compliant(&self, compliant: bool) -> Result<()> {
        self.set("compliant", compliant).await
    }

    pub async fn set_led(&self, color: LedColor) -> Result<()> {
        self.set("led", color.as_str()).await
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Move to `position` degrees. Without `wait` this only writes
    /// `goal_position`; with it, the move becomes a timed goto and the call
    /// returns once the expected duration has elapsed.
    pub async fn set_position(&self, position: f64, wait: bool) -> Result<()> {
        if wait {
            let duration = self.compute_duration(DurationInput::to(position)).await?;
            self.goto(position, duration, true).await
        } else {
            self.set("goal_position", position).await
        }
    }

    /// Rotate by `angle` degrees from `present_position`.
    pub async fn rotate(&self, angle: f64, duration: Option<f64>, wait: bool) -> Result<()> {
        let current = self.get_number("present_position").await?;
        let goal = current + angle;
        match duration {
            Some(d) => self.goto(goal, d, wait).await,
            None => self.set_position(goal, wait).await,
        }
    }

    /// Timed move through the motor goto endpoint.
    ///
    /// The request always carries `wait: false` (a waiting goto blocks the
    /// robot http server); waiting is done here with a timer instead, after
    /// which the `moving_speed` the firmware rewrote is put back.
    pub async fn goto(&self, position: f64, duration: f64, wait: bool) -> Result<()> {
        let speed = if wait {
            Some(self.get_register_value("moving_speed").await?)
        } else {
            None
        };

        let body = json!({
            "position": position,
            "duration": if duration > 0.0 { duration } else { MIN_GOTO_DURATION },
            "wait": false,
        });
        self.handler
            .post(&paths::motor_goto_url(self.name()), body)
            .await?;

        if let Some(speed) = speed {
            wait_secs(duration).await;
            self.set("moving_speed", speed).await?;
        }
        Ok(())
    }

    /// Expected duration, in seconds, of a move described by `input`.
    pub async fn compute_duration(&self, input: DurationInput) -> Result<f64> {
        let start = match input.start {
            Some(s) => s,
            None => self.get_number("present_position").await?,
        };
        let speed = match input.speed {
            Some(s) => s,
            None => self.get_number("moving_speed").await?,
        };
        Ok(movement_duration(start, input.end, speed))
    }

    pub async fn wait(&self, seconds: f64) {
        wait_secs(seconds).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
