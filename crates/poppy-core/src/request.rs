//! Access to the REST API served by the pypot http server running on the robot.
//!
//! [`RequestHandler`] is the capability every other module talks to. Only
//! `get` and `post` touch the network; the register and alias helpers are
//! provided on top of them, so a test double only has to answer raw URLs.

use crate::config::ConnectionSettings;
use crate::error::{PoppyError, Result};
use crate::paths;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Value of a motor register as returned by the robot (number, bool or string).
pub type RegisterValue = Value;

/// Register name → value. `None` marks a register whose request failed.
pub type Registers = BTreeMap<String, Option<RegisterValue>>;

// ---------------------------------------------------------------------------
// RequestHandler
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// GET `url` (relative to the API root) and return the decoded JSON body.
    async fn get(&self, url: &str) -> Result<Value>;

    /// POST `body` as JSON to `url` and return the decoded JSON body.
    async fn post(&self, url: &str, body: Value) -> Result<Value>;

    /// Read several registers of one motor.
    ///
    /// Sub-requests run concurrently. A failing one never fails the call:
    /// its register maps to `None` while the others still resolve.
    async fn get_register(&self, motor: &str, registers: &[&str]) -> Registers {
        let requests = registers.iter().map(|register| async move {
            let url = paths::register_url(motor, register);
            let value = match self.get(&url).await {
                Ok(body) => body.get(*register).cloned(),
                Err(e) => {
                    tracing::debug!(motor, register = *register, error = %e, "register read failed");
                    None
                }
            };
            (register.to_string(), value)
        });
        join_all(requests).await.into_iter().collect()
    }

    /// Write one register of one motor.
    async fn set_register(&self, motor: &str, register: &str, value: RegisterValue) -> Result<()> {
        let url = paths::register_url(motor, register);
        self.post(&url, normalize_register_value(value)).await?;
        Ok(())
    }

    /// Names of the motor aliases (groups) known by the robot.
    async fn get_aliases(&self) -> Result<Vec<String>> {
        let body = self.get(paths::ALIASES_ENDPOINT).await?;
        string_list(&body, "aliases", paths::ALIASES_ENDPOINT)
    }

    /// Motor names belonging to `alias`.
    async fn get_alias_motors(&self, alias: &str) -> Result<Vec<String>> {
        let url = paths::alias_url(alias);
        let body = self.get(&url).await?;
        string_list(&body, alias, &url)
    }
}

/// Non-integral numbers are truncated: integer registers of the firmware
/// reject floats. Booleans and strings pass through untouched.
pub fn normalize_register_value(value: RegisterValue) -> RegisterValue {
    match &value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => match n.as_f64() {
            Some(f) if f.is_finite() => Value::from(f.trunc() as i64),
            _ => value,
        },
        _ => value,
    }
}

fn string_list(body: &Value, key: &str, url: &str) -> Result<Vec<String>> {
    let list = body
        .get(key)
        .cloned()
        .ok_or_else(|| PoppyError::transport("GET", url, format!("missing '{key}' in response")))?;
    serde_json::from_value(list).map_err(|e| PoppyError::transport("GET", url, e))
}

// ---------------------------------------------------------------------------
// HttpRequestHandler
// ---------------------------------------------------------------------------

/// [`RequestHandler`] over HTTP, backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpRequestHandler {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRequestHandler {
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        Self::with_base_url(settings.base_url(), settings.timeout())
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PoppyError::transport("INIT", &base_url, e))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn perform(&self, method: reqwest::Method, url: &str, body: Option<Value>) -> Result<Value> {
        let full = format!("{}{}", self.base_url, url);
        tracing::trace!(%method, url = %full, "request");

        let mut request = self.client.request(method.clone(), &full);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PoppyError::transport(method.as_str(), url, e))?;

        let text = response
            .text()
            .await
            .map_err(|e| PoppyError::transport(method.as_str(), url, e))?;
        Ok(decode_body(&text))
    }
}

/// Empty bodies decode to `null`; bodies that are not JSON are kept as text.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl RequestHandler for HttpRequestHandler {
    async fn get(&self, url: &str) -> Result<Value> {
        self.perform(reqwest::Method::GET, url, None).await
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value> {
        self.perform(reqwest::Method::POST, url, Some(body)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRobot;
    use serde_json::json;

    #[test]
    fn floats_are_truncated() {
        assert_eq!(normalize_register_value(json!(12.7)), json!(12));
        assert_eq!(normalize_register_value(json!(-12.7)), json!(-12));
        assert_eq!(normalize_register_value(json!(100.0)), json!(100));
    }

    #[test]
    fn other_values_pass_through() {
        assert_eq!(normalize_register_value(json!(42)), json!(42));
        assert_eq!(normalize_register_value(json!(false)), json!(false));
        assert_eq!(normalize_register_value(json!("red")), json!("red"));
    }

    #[test]
    fn decode_body_variants() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(decode_body("ok"), json!("ok"));
    }

    #[tokio::test]
    async fn get_register_isolates_failures() {
        let robot = MockRobot::new(&["m1"]);
        robot.set("m1", "present_position", json!(10.5));
        robot.fail_on("/motors/m1/registers/goal_position/");

        let data = robot
            .get_register("m1", &["goal_position", "present_position"])
            .await;

        assert_eq!(data["goal_position"], None);
        assert_eq!(data["present_position"], Some(json!(10.5)));
    }

    #[tokio::test]
    async fn set_register_posts_normalized_value() {
        let robot = MockRobot::new(&["m1"]);
        robot.set_register("m1", "moving_speed", json!(99.9)).await.unwrap();
        assert_eq!(robot.value("m1", "moving_speed"), Some(json!(99)));
    }

    #[tokio::test]
    async fn aliases_and_alias_motors() {
        let robot = MockRobot::new(&["m1", "m2", "m3"])
            .with_alias("base", &["m1", "m2"])
            .with_alias("tip", &["m3"]);

        assert_eq!(robot.get_aliases().await.unwrap(), vec!["base", "tip"]);
        assert_eq!(robot.get_alias_motors("base").await.unwrap(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn alias_motors_missing_key_is_an_error() {
        let robot = MockRobot::new(&["m1"]);
        let err = robot.get_alias_motors("unknown").await.unwrap_err();
        assert!(matches!(err, PoppyError::Transport { .. }));
    }
}
