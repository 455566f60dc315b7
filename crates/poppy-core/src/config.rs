use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConnectionSettings
// ---------------------------------------------------------------------------

/// How to reach the pypot REST API of one robot.
///
/// Defaults target a Poppy Ergo Jr announced as `poppy.local` on port 8080.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms", alias = "timeout")]
    pub timeout_ms: u64,
    /// IPv4 address of `host` once resolved. Never persisted.
    #[serde(skip)]
    pub resolved: Option<IpAddr>,
}

fn default_host() -> String {
    "poppy.local".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_ms() -> u64 {
    500
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            resolved: None,
        }
    }
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Address used on the wire: the resolved IP when known, the host otherwise.
    pub fn address(&self) -> String {
        match self.resolved {
            Some(ip) => ip.to_string(),
            None => self.host.clone(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address(), self.port)
    }

    /// Resolve `host` to an IPv4 address.
    ///
    /// A failed lookup leaves `resolved` unset and requests go to the raw
    /// host name.
    pub async fn resolve(mut self) -> Self {
        match tokio::net::lookup_host((self.host.as_str(), self.port)).await {
            Ok(mut addrs) => {
                self.resolved = addrs.find(|a| a.is_ipv4()).map(|a| a.ip());
                tracing::debug!(host = %self.host, resolved = ?self.resolved, "host lookup");
            }
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "host lookup failed");
                self.resolved = None;
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// RcFile (.poppyrc)
// ---------------------------------------------------------------------------

/// Persisted CLI settings, stored as YAML. JSON rc files load as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RcFile {
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Descriptor file used instead of live discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<PathBuf>,
}

impl RcFile {
    /// Load `root/.poppyrc`, or defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from(&paths::rc_path(root))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let rc: RcFile = serde_yaml::from_str(&data)?;
        Ok(rc)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::rc_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Descriptor path made absolute against the directory holding the rc file.
    pub fn descriptor_path(&self, root: &Path) -> Option<PathBuf> {
        self.descriptor.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
