use std::{fmt, str::FromStr};

use crate::proto::QisError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Usb,
    Serial,
    Other(String),
}

impl Transport {
    fn as_str(&self) -> &str {
        match self {
            Self::Tcp => "TCP",
            Self::Usb => "USB",
            Self::Serial => "SERIAL",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Transport {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "TCP" => Self::Tcp,
            "USB" => Self::Usb,
            "SERIAL" => Self::Serial,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Identifier of a power module, e.g. `TCP:QTL2789-01-001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleAddress {
    pub transport: Transport,
    pub serial: String,
}

impl ModuleAddress {
    /// The identifier without its transport prefix. Used for file
    /// names and cache keys.
    pub fn device_id(&self) -> &str {
        &self.serial
    }

    /// The form QIS expects in front of device commands.
    pub fn qis_target(&self) -> String {
        format!("{}::{}", self.transport.as_str(), self.serial)
    }

    fn same_module(&self, other: &ModuleAddress) -> bool {
        self.transport == other.transport && self.serial.eq_ignore_ascii_case(&other.serial)
    }
}

impl FromStr for ModuleAddress {
    type Err = QisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (transport, serial) = s
            .split_once(':')
            .ok_or_else(|| QisError::InvalidAddress(s.to_string()))?;
        let serial = serial.trim_start_matches(':');
        if transport.is_empty()
            || serial.is_empty()
            || serial.chars().any(|c| c.is_whitespace())
            || !transport.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(QisError::InvalidAddress(s.to_string()));
        }
        Ok(Self {
            transport: Transport::from(transport),
            serial: serial.to_string(),
        })
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transport.as_str(), self.serial)
    }
}

/// Extracts module addresses from a `$list` reply.
///
/// Lines look like `1) TCP::QTL2789-01-001` and may carry trailing
/// details. Lines that do not start with an address are skipped.
pub fn parse_device_list(text: &str) -> Vec<ModuleAddress> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = match line.split_once(')') {
                Some((n, rest)) if n.chars().all(|c| c.is_ascii_digit()) => rest,
                _ => line,
            };
            line.split_whitespace().next()?.parse().ok()
        })
        .collect()
}

pub fn list_contains(list: &[ModuleAddress], address: &ModuleAddress) -> bool {
    list.iter().any(|a| a.same_module(address))
}
