use crate::error::{PoppyError, Result};
use crate::request::RequestHandler;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Static topology of one robot: its motors and the aliases grouping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    pub motors: Vec<MotorDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub motors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(alias = "lowerLimit")]
    pub lower_limit: f64,
    #[serde(alias = "upperLimit")]
    pub upper_limit: f64,
}

impl MotorDescriptor {
    pub fn new(name: impl Into<String>, lower_limit: f64, upper_limit: f64) -> Self {
        Self {
            name: name.into(),
            id: None,
            model: None,
            lower_limit,
            upper_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// DescriptorWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl Descriptor {
    pub fn motor_names(&self) -> Vec<String> {
        self.motors.iter().map(|m| m.name.clone()).collect()
    }

    pub fn motor(&self, name: &str) -> Option<&MotorDescriptor> {
        self.motors.iter().find(|m| m.name == name)
    }

    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let descriptor: Descriptor = serde_json::from_str(&data)?;
        Ok(descriptor)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<DescriptorWarning> {
        let mut warnings = Vec::new();

        // 1. Every alias member must be a declared motor
        for alias in &self.aliases {
            for motor in &alias.motors {
                if self.motor(motor).is_none() {
                    warnings.push(DescriptorWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "alias '{}' references unknown motor '{}'",
                            alias.name, motor
                        ),
                    });
                }
            }
        }

        // 2. Motor names are unique
        let mut seen = HashSet::new();
        for motor in &self.motors {
            if !seen.insert(motor.name.as_str()) {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!("motor '{}' is declared more than once", motor.name),
                });
            }
        }

        // 3. Angle range must not be inverted
        for motor in &self.motors {
            if motor.lower_limit > motor.upper_limit {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "motor '{}' has lower_limit {} above upper_limit {}",
                        motor.name, motor.lower_limit, motor.upper_limit
                    ),
                });
            }
        }

        warnings
    }

    /// Differences between this (stored) descriptor and a `live` one
    /// discovered from the robot. Empty when they match.
    pub fn compare(&self, live: &Descriptor) -> Vec<String> {
        let mut diffs = Vec::new();

        for motor in &self.motors {
            match live.motor(&motor.name) {
                None => diffs.push(format!("motor '{}' not found on robot", motor.name)),
                Some(found) => {
                    if found.lower_limit != motor.lower_limit
                        || found.upper_limit != motor.upper_limit
                    {
                        diffs.push(format!(
                            "motor '{}': range [{}, {}] on robot, [{}, {}] in descriptor",
                            motor.name,
                            found.lower_limit,
                            found.upper_limit,
                            motor.lower_limit,
                            motor.upper_limit
                        ));
                    }
                    if motor.model.is_some() && found.model != motor.model {
                        diffs.push(format!(
                            "motor '{}': model {} on robot, {} in descriptor",
                            motor.name,
                            found.model.as_deref().unwrap_or("-"),
                            motor.model.as_deref().unwrap_or("-")
                        ));
                    }
                }
            }
        }
        for motor in &live.motors {
            if self.motor(&motor.name).is_none() {
                diffs.push(format!("motor '{}' missing from descriptor", motor.name));
            }
        }

        for alias in &self.aliases {
            match live.alias(&alias.name) {
                None => diffs.push(format!("alias '{}' not found on robot", alias.name)),
                Some(found) if found.motors != alias.motors => diffs.push(format!(
                    "alias '{}': [{}] on robot, [{}] in descriptor",
                    alias.name,
                    found.motors.join(", "),
                    alias.motors.join(", ")
                )),
                Some(_) => {}
            }
        }

        diffs
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

const DISCOVERY_REGISTERS: [&str; 4] = ["model", "id", "lower_limit", "upper_limit"];

/// Build a descriptor by querying the robot: aliases first, then the
/// registers describing every motor they reference.
pub async fn discover_descriptor(
    handler: &dyn RequestHandler,
    location: &str,
) -> Result<Descriptor> {
    let aliases = discover_aliases(handler)
        .await
        .map_err(|e| PoppyError::Discovery(e.to_string()))?;

    let mut names: Vec<&str> = Vec::new();
    for alias in &aliases {
        for motor in &alias.motors {
            if !names.contains(&motor.as_str()) {
                names.push(motor);
            }
        }
    }

    let motors = try_join_all(names.into_iter().map(|name| discover_motor(handler, name)))
        .await?;

    tracing::info!(location, motors = motors.len(), aliases = aliases.len(), "robot discovered");

    Ok(Descriptor {
        name: location.to_string(),
        description: Some(format!("Robot lively discovered from {location}")),
        aliases,
        motors,
    })
}

async fn discover_aliases(handler: &dyn RequestHandler) -> Result<Vec<Alias>> {
    let mut aliases = Vec::new();
    for name in handler.get_aliases().await? {
        let motors = handler.get_alias_motors(&name).await?;
        aliases.push(Alias { name, motors });
    }
    Ok(aliases)
}

async fn discover_motor(handler: &dyn RequestHandler, name: &str) -> Result<MotorDescriptor> {
    let data = handler.get_register(name, &DISCOVERY_REGISTERS).await;

    let limit = |register: &str| -> Result<f64> {
        data.get(register)
            .and_then(|v| v.as_ref())
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                PoppyError::Discovery(format!("motor '{name}': unable to read '{register}'"))
            })
    };

    Ok(MotorDescriptor {
        name: name.to_string(),
        id: data
            .get("id")
            .and_then(|v| v.as_ref())
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok()),
        model: data
            .get("model")
            .and_then(|v| v.as_ref())
            .and_then(|v| v.as_str())
            .map(str::to_string),
        lower_limit: limit("lower_limit")?,
        upper_limit: limit("upper_limit")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
