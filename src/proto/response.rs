use std::fmt;

/// A QIS reply is free text terminated by the `>` prompt.
/// Replies starting with `FAIL` are rejections, the rest of the
/// line carries the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Fail(String),
}

impl Response {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_prefix("FAIL") {
            Some(reason) => Self::Fail(
                reason
                    .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                    .to_string(),
            ),
            None => Self::Ok(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Overrun,
    User,
    Unknown,
}

/// Result of the `stream?` query after a stream has been stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// Not reported as stopped, all data was captured.
    Ok(String),
    Stopped(StopReason, String),
}

impl StreamStatus {
    pub fn parse(text: &str) -> Self {
        let raw = text.trim().to_string();
        if raw.contains("Stopped") {
            let reason = if raw.contains("Overrun") {
                StopReason::Overrun
            } else if raw.contains("User") {
                StopReason::User
            } else {
                StopReason::Unknown
            };
            Self::Stopped(reason, raw)
        } else {
            Self::Ok(raw)
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Ok(raw) | Self::Stopped(_, raw) => raw,
        }
    }

    pub fn is_overrun(&self) -> bool {
        matches!(self, Self::Stopped(StopReason::Overrun, _))
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => f.write_str("Stream ran correctly"),
            Self::Stopped(StopReason::Overrun, _) => {
                f.write_str("Stream interrupted due to internal device buffer filling up")
            }
            Self::Stopped(StopReason::User, _) => f.write_str("Stream Stopped"),
            Self::Stopped(StopReason::Unknown, _) => f.write_str("Stopped for unknown reason"),
        }
    }
}
