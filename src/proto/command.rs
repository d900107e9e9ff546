use std::fmt;

use crate::interval::ResampleInterval;

/// Requests understood by QIS.
///
/// Service commands start with `$`, everything else is addressed to a
/// single module and prefixed with its QIS target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    List,
    Scan,
    Shutdown,
    Device {
        target: String,
        request: DeviceRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    // Streaming setup
    Resample(ResampleInterval),
    // Recording
    RecordStream,
    RecordStop,
    // Stream data
    StreamHeader,
    StreamData,
    StreamStatus,
}

impl Command {
    pub fn device(target: impl AsRef<str>, request: DeviceRequest) -> Self {
        Self::Device {
            target: target.as_ref().to_string(),
            request,
        }
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resample(interval) => write!(f, "stream mode resample {}", interval),
            Self::RecordStream => f.write_str("rec stream"),
            Self::RecordStop => f.write_str("rec stop"),
            Self::StreamHeader => f.write_str("stream text header"),
            Self::StreamData => f.write_str("stream text all"),
            Self::StreamStatus => f.write_str("stream?"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("$version"),
            Self::List => f.write_str("$list"),
            Self::Scan => f.write_str("$scan"),
            Self::Shutdown => f.write_str("$shutdown"),
            Self::Device { target, request } => write!(f, "{} {}", target, request),
        }
    }
}
