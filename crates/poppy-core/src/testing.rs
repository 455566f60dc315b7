//! In-memory robot answering the pypot REST routes, for unit tests.

use crate::descriptor::{Descriptor, MotorDescriptor};
use crate::error::{PoppyError, Result};
use crate::request::RequestHandler;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Start(String),
    End(String),
}

#[derive(Default)]
pub(crate) struct MockRobot {
    motors: Vec<String>,
    aliases: Vec<(String, Vec<String>)>,
    registers: Mutex<HashMap<(String, String), Value>>,
    failing: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    events: Mutex<Vec<Event>>,
    delay: Option<Duration>,
}

impl MockRobot {
    pub fn new(motors: &[&str]) -> Self {
        let robot = Self {
            motors: motors.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        for (i, motor) in motors.iter().enumerate() {
            robot.set(motor, "id", json!(i + 1));
            robot.set(motor, "model", json!("XL-320"));
            robot.set(motor, "lower_limit", json!(-90));
            robot.set(motor, "upper_limit", json!(90));
            robot.set(motor, "present_position", json!(0.0));
            robot.set(motor, "goal_position", json!(0.0));
            robot.set(motor, "moving_speed", json!(0));
            robot.set(motor, "compliant", json!(true));
            robot.set(motor, "led", json!("off"));
        }
        robot
    }

    pub fn with_alias(mut self, alias: &str, motors: &[&str]) -> Self {
        self.aliases.push((
            alias.to_string(),
            motors.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    /// Every request sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            name: "mock".into(),
            description: None,
            aliases: Vec::new(),
            motors: self
                .motors
                .iter()
                .map(|m| MotorDescriptor::new(m.clone(), -90.0, 90.0))
                .collect(),
        }
    }

    pub fn set(&self, motor: &str, register: &str, value: Value) {
        self.registers
            .lock()
            .unwrap()
            .insert((motor.to_string(), register.to_string()), value);
    }

    pub fn value(&self, motor: &str, register: &str) -> Option<Value> {
        self.registers
            .lock()
            .unwrap()
            .get(&(motor.to_string(), register.to_string()))
            .cloned()
    }

    /// Requests whose URL contains `pattern` fail with a transport error.
    pub fn fail_on(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == "POST")
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    async fn enter(&self, method: &'static str, url: &str, body: Option<Value>) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            body,
        });
        self.events.lock().unwrap().push(Event::Start(url.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing.lock().unwrap().iter().any(|p| url.contains(p));
        self.events.lock().unwrap().push(Event::End(url.to_string()));
        if failing {
            return Err(PoppyError::transport(method, url, "mock failure"));
        }
        Ok(())
    }

    fn not_found(method: &str, url: &str) -> PoppyError {
        PoppyError::transport(method, url, "HTTP status client error (404 Not Found)")
    }
}

#[async_trait]
impl RequestHandler for MockRobot {
    async fn get(&self, url: &str) -> Result<Value> {
        self.enter("GET", url, None).await?;

        let parts: Vec<&str> = url.trim_start_matches('/').split('/').collect();
        match parts.as_slice() {
            ["motors", "aliases", "list.json"] => {
                let names: Vec<&String> = self.aliases.iter().map(|(a, _)| a).collect();
                Ok(json!({ "aliases": names }))
            }
            ["motors", alias, "list.json"] => self
                .aliases
                .iter()
                .find(|(a, _)| a == alias)
                .map(|(a, motors)| json!({ a.clone(): motors }))
                .ok_or_else(|| Self::not_found("GET", url)),
            ["motors", motor, "registers", register, "value.json"] => self
                .value(motor, register)
                .map(|v| json!({ register.to_string(): v }))
                .ok_or_else(|| Self::not_found("GET", url)),
            _ => Err(Self::not_found("GET", url)),
        }
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value> {
        self.enter("POST", url, Some(body.clone())).await?;

        let parts: Vec<&str> = url.trim_start_matches('/').split('/').collect();
        match parts.as_slice() {
            ["motors", "goto.json"] => {
                let motors = body["motors"].as_array().cloned().unwrap_or_default();
                let positions = body["positions"].as_array().cloned().unwrap_or_default();
                for (motor, position) in motors.iter().zip(positions) {
                    let motor = motor.as_str().unwrap_or_default();
                    self.set(motor, "goal_position", position.clone());
                    self.set(motor, "present_position", position);
                }
                Ok(Value::Null)
            }
            ["motors", motor, "goto.json"] => {
                self.set(motor, "goal_position", body["position"].clone());
                self.set(motor, "present_position", body["position"].clone());
                Ok(Value::Null)
            }
            ["motors", motor, "registers", register, "value.json"] => {
                self.set(motor, register, body);
                Ok(Value::Null)
            }
            _ => Err(Self::not_found("POST", url)),
        }
    }
}
