//! Configuration for the pipe transport, the wire codec and the client.
//!
//! Every section has defaults, so an empty YAML document is a valid config.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "HTTPIPE_CONFIG";
/// Environment variable overriding the pipe name.
pub const PIPE_ENV: &str = "HTTPIPE_PIPE";

pub const DEFAULT_PIPE_NAME: &str = "httpipe";

/// Largest explicit instance count a named pipe accepts (255 means unlimited).
pub const MAX_PIPE_INSTANCES: usize = 254;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipe: PipeConfig,
    pub codec: CodecConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionMode {
    #[default]
    Byte,
    Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Pipe name. On Unix a name containing `/` is used as the socket path.
    pub name: String,
    /// Machine hosting the pipe; `.` is the local machine.
    pub server_name: String,
    /// Upper bound on simultaneous server instances, `None` for unlimited.
    pub max_instances: Option<usize>,
    pub transmission_mode: TransmissionMode,
    pub in_buffer_size: u32,
    pub out_buffer_size: u32,
    pub connect_timeout_ms: u64,
    /// Number of accept loops, each owning one pending instance.
    pub workers: usize,
    pub bootstrap_attempts: usize,
    pub bootstrap_connect_timeout_ms: u64,
    /// How long `stop` waits for accept loops before aborting them.
    pub stop_timeout_ms: u64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPE_NAME.to_string(),
            server_name: ".".to_string(),
            max_instances: None,
            transmission_mode: TransmissionMode::Byte,
            in_buffer_size: 65536,
            out_buffer_size: 65536,
            connect_timeout_ms: 5000,
            workers: 5,
            bootstrap_attempts: 500,
            bootstrap_connect_timeout_ms: 10,
            stop_timeout_ms: 5000,
        }
    }
}

impl PipeConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn bootstrap_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_connect_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("pipe name must not be empty");
        }
        if self.server_name.is_empty() {
            anyhow::bail!("pipe server name must not be empty");
        }
        if self.workers == 0 {
            anyhow::bail!("at least one accept worker is required");
        }
        if self.bootstrap_attempts == 0 {
            anyhow::bail!("bootstrap_attempts must be positive");
        }
        if let Some(max) = self.max_instances {
            if max == 0 || max > MAX_PIPE_INSTANCES {
                anyhow::bail!("max_instances must be between 1 and {MAX_PIPE_INSTANCES}, got {max}");
            }
            // each worker plus the bootstrap instance needs a slot
            if max < self.workers + 1 {
                anyhow::bail!(
                    "max_instances ({max}) must exceed the number of workers ({})",
                    self.workers
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Initial capacity of the line reader buffer; grows on demand.
    pub line_buffer_size: usize,
    /// Fixed capacity of the header writer buffer.
    pub header_buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            line_buffer_size: 4096,
            header_buffer_size: 4096,
            max_line_length: 64 * 1024,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.line_buffer_size == 0 || self.header_buffer_size == 0 {
            anyhow::bail!("codec buffer sizes must be positive");
        }
        if self.max_line_length < self.line_buffer_size {
            anyhow::bail!("max_line_length must be at least line_buffer_size");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on dial plus response head; `None` waits indefinitely.
    pub request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Loads the file named by `HTTPIPE_CONFIG` (defaults when unset) and
    /// applies the `HTTPIPE_PIPE` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        if let Ok(name) = std::env::var(PIPE_ENV) {
            cfg.pipe.name = name;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(text).context("failed to parse YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipe.validate()?;
        self.codec.validate()
    }
}
