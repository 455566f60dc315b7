pub mod config;
pub mod exec;
pub mod init;
pub mod query;

use anyhow::Context;
use poppy_core::config::{ConnectionSettings, RcFile};
use poppy_core::script::MotorSelector;
use poppy_core::Poppy;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Connection flags given on the command line. Each one wins over `.poppyrc`.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub descriptor: Option<PathBuf>,
}

/// Effective settings: `.poppyrc` values with the command line applied on top.
#[derive(Debug, Clone)]
pub struct Session {
    pub settings: ConnectionSettings,
    pub descriptor: Option<PathBuf>,
}

impl Session {
    pub fn load(root: &Path, overrides: Overrides) -> anyhow::Result<Self> {
        let rc = RcFile::load(root).context("failed to load .poppyrc")?;
        let mut settings = rc.connection.clone();
        if let Some(host) = overrides.host {
            settings.host = host;
        }
        if let Some(port) = overrides.port {
            settings.port = port;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        let descriptor = overrides.descriptor.or_else(|| rc.descriptor_path(root));
        Ok(Self {
            settings,
            descriptor,
        })
    }

    /// Build the robot from the descriptor file when one is set, from live
    /// discovery otherwise.
    pub async fn connect(&self) -> anyhow::Result<Poppy> {
        match &self.descriptor {
            Some(path) => Poppy::with_descriptor_file(self.settings.clone(), path)
                .await
                .with_context(|| format!("failed to load descriptor {}", path.display())),
            None => Poppy::connect(self.settings.clone()).await.with_context(|| {
                format!("failed to connect to {}", self.settings.base_url())
            }),
        }
    }
}

/// Run `future` to completion on a fresh tokio runtime.
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(future))
}

/// Resolve `names` against the robot and reject motors it does not have.
pub fn select_motors(poppy: &Poppy, names: &[String]) -> anyhow::Result<Vec<String>> {
    let selector = MotorSelector::from_names(names.iter().cloned());
    let motors = poppy.resolve(&selector);
    let unknown: Vec<&str> = motors
        .iter()
        .filter(|m| poppy.get_motor(m).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!(
            "unknown motor(s): {} (available: {})",
            unknown.join(", "),
            poppy.motor_names().join(", ")
        );
    }
    Ok(motors)
}
