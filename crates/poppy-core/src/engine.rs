//! Expansion of scripts into steps and their sequential execution.

use crate::error::Result;
use crate::motor::{wait_secs, LedColor};
use crate::poppy::Poppy;
use crate::script::{Action, Motion, Script};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One unit of work. Moves address the whole motor group at once, waits
/// the robot, every other action a single motor.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Wait { seconds: f64 },
    Move { motors: Vec<String>, position: f64, motion: Motion },
    Rotate { motors: Vec<String>, angle: f64, motion: Motion },
    SetLed { motor: String, color: LedColor },
    SetSpeed { motor: String, speed: u16 },
    SetCompliant { motor: String, compliant: bool },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Wait { .. } => "wait",
            Step::Move { .. } => "move",
            Step::Rotate { .. } => "rotate",
            Step::SetLed { .. } => "set_led",
            Step::SetSpeed { .. } => "set_speed",
            Step::SetCompliant { .. } => "set_compliant",
        }
    }

    /// `robot`, a motor name, or a comma separated group.
    pub fn target(&self) -> String {
        match self {
            Step::Wait { .. } => "robot".to_string(),
            Step::Move { motors, .. } | Step::Rotate { motors, .. } => motors.join(","),
            Step::SetLed { motor, .. }
            | Step::SetSpeed { motor, .. }
            | Step::SetCompliant { motor, .. } => motor.clone(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action(), self.target())
    }
}

// ---------------------------------------------------------------------------
// ExecReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub index: usize,
    pub target: String,
    pub action: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecReport {
    pub steps: usize,
    pub failures: Vec<StepFailure>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ExecReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// ScriptEngine
// ---------------------------------------------------------------------------

pub struct ScriptEngine<'a> {
    poppy: &'a Poppy,
}

impl<'a> ScriptEngine<'a> {
    pub fn new(poppy: &'a Poppy) -> Self {
        Self { poppy }
    }

    /// Flatten scripts into steps, in order, against the current topology.
    pub fn plan(&self, scripts: &[Script]) -> Vec<Step> {
        let mut steps = Vec::new();
        for handler in scripts.iter().flat_map(|s| s.handlers()) {
            let motors = self.poppy.resolve(&handler.motors);
            for action in &handler.actions {
                match *action {
                    Action::Wait { value } => steps.push(Step::Wait { seconds: value }),
                    Action::Move { .. } | Action::Rotate { .. } if motors.is_empty() => {}
                    Action::Move {
                        value,
                        duration,
                        wait,
                    } => steps.push(Step::Move {
                        motors: motors.clone(),
                        position: value,
                        motion: Motion { duration, wait },
                    }),
                    Action::Rotate {
                        value,
                        duration,
                        wait,
                    } => steps.push(Step::Rotate {
                        motors: motors.clone(),
                        angle: value,
                        motion: Motion { duration, wait },
                    }),
                    Action::SetLed { value } => steps.extend(motors.iter().map(|m| Step::SetLed {
                        motor: m.clone(),
                        color: value,
                    })),
                    Action::SetSpeed { value } => {
                        steps.extend(motors.iter().map(|m| Step::SetSpeed {
                            motor: m.clone(),
                            speed: value,
                        }))
                    }
                    Action::SetCompliant { value } => {
                        steps.extend(motors.iter().map(|m| Step::SetCompliant {
                            motor: m.clone(),
                            compliant: value,
                        }))
                    }
                }
            }
        }
        steps
    }

    /// Run every step in order, each awaited before the next. A failed step
    /// is logged and recorded; the remaining steps still run.
    pub async fn exec(&self, scripts: &[Script]) -> ExecReport {
        let steps = self.plan(scripts);
        let start = Instant::now();
        let mut failures = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            tracing::debug!(index, step = %step, "running step");
            if let Err(e) = self.run(step).await {
                tracing::warn!(
                    index,
                    motors = %step.target(),
                    action = step.action(),
                    error = %e,
                    "step failed"
                );
                failures.push(StepFailure {
                    index,
                    target: step.target(),
                    action: step.action().to_string(),
                    message: e.to_string(),
                });
            }
        }

        ExecReport {
            steps: steps.len(),
            failures,
            elapsed: start.elapsed(),
        }
    }

    async fn run(&self, step: &Step) -> Result<()> {
        match step {
            Step::Wait { seconds } => {
                wait_secs(*seconds).await;
                Ok(())
            }
            Step::Move {
                motors,
                position,
                motion,
            } => self.poppy.move_to(motors, *position, *motion).await,
            Step::Rotate {
                motors,
                angle,
                motion,
            } => self.poppy.rotate(motors, *angle, *motion).await,
            Step::SetLed { motor, color } => self.poppy.motor(motor)?.set_led(*color).await,
            Step::SetSpeed { motor, speed } => self.poppy.motor(motor)?.set_speed(*speed).await,
            Step::SetCompliant { motor, compliant } => {
                self.poppy.motor(motor)?.set_compliant(*compliant).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
