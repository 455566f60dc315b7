use crate::config::ConnectionSettings;
use crate::descriptor::{discover_descriptor, Descriptor};
use crate::engine::{ExecReport, ScriptEngine};
use crate::error::{PoppyError, Result};
use crate::motor::{wait_secs, DurationInput, MotorHandle, MIN_GOTO_DURATION};
use crate::paths;
use crate::request::{HttpRequestHandler, Registers, RequestHandler};
use crate::script::{Motion, MotorSelector, Script};
use futures::future::{join_all, try_join_all};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Register values of each queried motor.
pub type QueryResult = BTreeMap<String, Registers>;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Positions or angles for a group of motors: one value shared by all, or
/// one value per motor in selection order.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Same(f64),
    PerMotor(Vec<f64>),
}

impl Targets {
    pub fn expand(&self, motors: usize) -> Result<Vec<f64>> {
        match self {
            Targets::Same(v) => Ok(vec![*v; motors]),
            Targets::PerMotor(values) if values.len() == motors => Ok(values.clone()),
            Targets::PerMotor(values) => Err(PoppyError::LengthMismatch {
                motors,
                values: values.len(),
            }),
        }
    }
}

impl From<f64> for Targets {
    fn from(v: f64) -> Self {
        Targets::Same(v)
    }
}

impl From<Vec<f64>> for Targets {
    fn from(values: Vec<f64>) -> Self {
        Targets::PerMotor(values)
    }
}

// ---------------------------------------------------------------------------
// Poppy
// ---------------------------------------------------------------------------

/// A robot: its descriptor, one shared request handler and a handle per motor.
pub struct Poppy {
    descriptor: Descriptor,
    handler: Arc<dyn RequestHandler>,
    motors: Vec<MotorHandle>,
}

impl fmt::Debug for Poppy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poppy")
            .field("descriptor", &self.descriptor.name)
            .field("motors", &self.motor_names())
            .finish_non_exhaustive()
    }
}

impl Poppy {
    pub fn new(descriptor: Descriptor, handler: Arc<dyn RequestHandler>) -> Self {
        let motors = build_motors(&descriptor, &handler);
        Self {
            descriptor,
            handler,
            motors,
        }
    }

    /// Resolve the host, then discover the robot topology over HTTP.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self> {
        let settings = settings.resolve().await;
        let handler = HttpRequestHandler::new(&settings)
            .map_err(|e| PoppyError::Discovery(e.to_string()))?;
        let descriptor = discover_descriptor(&handler, &settings.host).await?;
        Ok(Self::new(descriptor, Arc::new(handler)))
    }

    /// Talk to the robot described by a descriptor file, skipping discovery.
    pub async fn with_descriptor_file(settings: ConnectionSettings, path: &Path) -> Result<Self> {
        let descriptor = Descriptor::load(path)?;
        let settings = settings.resolve().await;
        let handler = HttpRequestHandler::new(&settings)?;
        Ok(Self::new(descriptor, Arc::new(handler)))
    }

    /// Swap the topology. Later `All` selections see the new motor list.
    pub fn set_descriptor(&mut self, descriptor: Descriptor) {
        self.motors = build_motors(&descriptor, &self.handler);
        self.descriptor = descriptor;
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &Arc<dyn RequestHandler> {
        &self.handler
    }

    pub fn motor_names(&self) -> Vec<String> {
        self.motors.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn motors(&self) -> &[MotorHandle] {
        &self.motors
    }

    pub fn get_motor(&self, name: &str) -> Option<&MotorHandle> {
        self.motors.iter().find(|m| m.name() == name)
    }

    pub fn motor(&self, name: &str) -> Result<&MotorHandle> {
        self.get_motor(name)
            .ok_or_else(|| PoppyError::MotorNotFound(name.to_string()))
    }

    /// Motor names targeted by `selector` against the current topology.
    ///
    /// A single name that is an alias and not a motor expands to the alias
    /// members. Other names are returned as given, unknown ones included.
    pub fn resolve(&self, selector: &MotorSelector) -> Vec<String> {
        match selector {
            MotorSelector::All => self.motor_names(),
            MotorSelector::Named(names) => match names.as_slice() {
                [name] if self.get_motor(name).is_none() => self
                    .descriptor
                    .alias(name)
                    .map(|a| a.motors.clone())
                    .unwrap_or_else(|| names.clone()),
                _ => names.clone(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read `registers` on every selected motor concurrently. Unknown motors
    /// and failed reads show up as `None` values.
    pub async fn query(&self, selector: &MotorSelector, registers: &[&str]) -> QueryResult {
        let names = self.resolve(selector);
        let reads = names.iter().map(|name| async move {
            let values = match self.get_motor(name) {
                Some(motor) => motor.get(registers).await,
                None => {
                    tracing::warn!(motor = %name, "unknown motor in query");
                    registers.iter().map(|r| (r.to_string(), None)).collect()
                }
            };
            (name.clone(), values)
        });
        join_all(reads).await.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Absolute move of a group of motors.
    ///
    /// With a duration this is one batched goto. Waiting without a duration
    /// uses the slowest motor's expected duration for that goto. Otherwise
    /// each motor gets its `goal_position` written in turn.
    pub async fn move_to(
        &self,
        motors: &[String],
        positions: impl Into<Targets>,
        motion: Motion,
    ) -> Result<()> {
        let positions = positions.into().expand(motors.len())?;
        if motors.is_empty() {
            return Ok(());
        }
        let handles = self.handles(motors)?;

        if let Some(duration) = motion.duration {
            return self.goto(motors, positions, duration, motion.wait).await;
        }

        if motion.wait {
            let durations = try_join_all(
                handles
                    .iter()
                    .zip(&positions)
                    .map(|(m, p)| m.compute_duration(DurationInput::to(*p))),
            )
            .await?;
            let duration = durations.into_iter().fold(0.0, f64::max);
            return self.goto(motors, positions, duration, true).await;
        }

        for (motor, position) in handles.iter().zip(positions) {
            motor.set_position(position, false).await?;
        }
        Ok(())
    }

    /// Relative move of a group of motors from their `present_position`.
    pub async fn rotate(
        &self,
        motors: &[String],
        angles: impl Into<Targets>,
        motion: Motion,
    ) -> Result<()> {
        let angles = angles.into().expand(motors.len())?;
        let handles = self.handles(motors)?;
        let current =
            try_join_all(handles.iter().map(|m| m.get_number("present_position"))).await?;
        let positions: Vec<f64> = current.iter().zip(&angles).map(|(c, a)| c + a).collect();
        self.move_to(motors, positions, motion).await
    }

    /// One batched goto request for the whole group. The request never asks
    /// the robot to wait; `wait` sleeps for `duration` locally instead.
    pub async fn goto(
        &self,
        motors: &[String],
        positions: impl Into<Targets>,
        duration: f64,
        wait: bool,
    ) -> Result<()> {
        let positions = positions.into().expand(motors.len())?;
        let body = json!({
            "motors": motors,
            "positions": positions,
            "duration": if duration > 0.0 { duration } else { MIN_GOTO_DURATION },
            "wait": false,
        });
        self.handler.post(paths::GOTO_ENDPOINT, body).await?;
        if wait {
            wait_secs(duration).await;
        }
        Ok(())
    }

    pub async fn wait(&self, seconds: f64) {
        wait_secs(seconds).await
    }

    /// Run scripts one step at a time. Step failures are logged and reported,
    /// never returned as errors.
    pub async fn exec(&self, scripts: &[Script]) -> ExecReport {
        ScriptEngine::new(self).exec(scripts).await
    }

    fn handles(&self, names: &[String]) -> Result<Vec<&MotorHandle>> {
        names.iter().map(|n| self.motor(n)).collect()
    }
}

fn build_motors(descriptor: &Descriptor, handler: &Arc<dyn RequestHandler>) -> Vec<MotorHandle> {
    descriptor
        .motors
        .iter()
        .map(|m| MotorHandle::new(m.clone(), Arc::clone(handler)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
