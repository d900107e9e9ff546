use std::path::PathBuf;
use std::time::Duration;

use crate::address::ModuleAddress;
use crate::interval::ResampleInterval;
use crate::monitor::{default_channels, Channel, DEFAULT_MONITOR_INTERVAL};
use crate::proto::{QisError, Result};

pub const DEFAULT_QIS_HOST: &str = "127.0.0.1";

/// Default QIS port.
pub const DEFAULT_QIS_PORT: u16 = 9722;

/// How QIS is started when it is not running yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub java: PathBuf,
    pub jar: PathBuf,
    pub start_timeout: Duration,
}

impl Default for Launcher {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: PathBuf::from("qis.jar"),
            start_timeout: Duration::from_secs(20),
        }
    }
}

/// Settings of one streaming run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    pub resample: ResampleInterval,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub modules: Vec<ModuleAddress>,
    pub connect_timeout: Duration,
    pub launcher: Launcher,
    pub output_dir: PathBuf,
    pub stream: StreamPlan,
    pub monitor: StreamPlan,
    pub monitor_interval: Duration,
    pub channels: Vec<Channel>,
}

impl Settings {
    pub fn service_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Modules to stream with, failing when none are configured.
    pub fn require_modules(&self) -> Result<&[ModuleAddress]> {
        if self.modules.is_empty() {
            return Err(QisError::NoModules);
        }
        Ok(&self.modules)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_QIS_HOST.to_string(),
            port: DEFAULT_QIS_PORT,
            modules: Vec::new(),
            connect_timeout: Duration::from_secs(30),
            launcher: Launcher::default(),
            output_dir: PathBuf::from("."),
            stream: StreamPlan {
                resample: ResampleInterval::from_millis(1),
                duration: Duration::from_secs(30),
            },
            monitor: StreamPlan {
                resample: ResampleInterval::from_millis(500),
                duration: Duration::from_secs(30),
            },
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            channels: default_channels(),
        }
    }
}
