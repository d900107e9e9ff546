use std::{fmt, str::FromStr, time::Duration};

use crate::proto::QisError;

/// Resampling granularity requested for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleInterval {
    Off,
    Every(Duration),
}

impl ResampleInterval {
    pub fn from_millis(ms: u64) -> Self {
        Self::Every(Duration::from_millis(ms))
    }
}

impl FromStr for ResampleInterval {
    type Err = QisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("off") {
            return Ok(Self::Off);
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| QisError::InvalidInterval(s.to_string()))?;
        let (value, unit) = s.split_at(split);
        let value = value
            .parse::<u64>()
            .map_err(|_| QisError::InvalidInterval(s.to_string()))?;
        let duration = match unit.to_ascii_lowercase().as_str() {
            "ns" => Duration::from_nanos(value),
            "us" => Duration::from_micros(value),
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            _ => return Err(QisError::InvalidInterval(s.to_string())),
        };
        if duration.is_zero() {
            return Err(QisError::InvalidInterval(s.to_string()));
        }
        Ok(Self::Every(duration))
    }
}

impl fmt::Display for ResampleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Every(d) => {
                let nanos = d.as_nanos();
                if nanos % 1_000_000_000 == 0 {
                    write!(f, "{}S", nanos / 1_000_000_000)
                } else if nanos % 1_000_000 == 0 {
                    write!(f, "{}mS", nanos / 1_000_000)
                } else if nanos % 1_000 == 0 {
                    write!(f, "{}uS", nanos / 1_000)
                } else {
                    write!(f, "{}nS", nanos)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            "1mS".parse::<ResampleInterval>().unwrap(),
            ResampleInterval::from_millis(1)
        );
        assert_eq!(
            "500ms".parse::<ResampleInterval>().unwrap(),
            ResampleInterval::from_millis(500)
        );
        assert_eq!(
            "100uS".parse::<ResampleInterval>().unwrap(),
            ResampleInterval::Every(Duration::from_micros(100))
        );
        assert_eq!(
            "OFF".parse::<ResampleInterval>().unwrap(),
            ResampleInterval::Off
        );
    }

    #[test]
    fn test_parse_invalid() {
        for s in ["", "ms", "10", "0mS", "5min", "-1mS"] {
            assert!(s.parse::<ResampleInterval>().is_err(), "{}", s);
        }
    }

    #[test]
    fn test_display_uses_largest_unit() {
        assert_eq!(ResampleInterval::from_millis(1000).to_string(), "1S");
        assert_eq!(ResampleInterval::from_millis(500).to_string(), "500mS");
        assert_eq!(ResampleInterval::from_millis(1).to_string(), "1mS");
        assert_eq!(
            ResampleInterval::Every(Duration::from_micros(1500)).to_string(),
            "1500uS"
        );
    }
}
