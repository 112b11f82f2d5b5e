//! Operator-tunable severity for alarm-style log events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity used when a resource group runs out of live resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Logged at `ERROR`.
    Error,
    /// Logged at `WARN`.
    #[default]
    Warn,
    /// Logged at `INFO`.
    Info,
    /// Logged at `DEBUG`.
    Debug,
    /// Logged at `TRACE`.
    Trace,
}

impl FromStr for NoticeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "severe" | "critical" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" | "notice" => Ok(Self::Info),
            "debug" | "fine" => Ok(Self::Debug),
            "trace" | "finest" => Ok(Self::Trace),
            other => Err(format!("unknown notice level '{other}'")),
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("WARNING".parse::<NoticeLevel>(), Ok(NoticeLevel::Warn));
        assert_eq!("severe".parse::<NoticeLevel>(), Ok(NoticeLevel::Error));
        assert_eq!(" info ".parse::<NoticeLevel>(), Ok(NoticeLevel::Info));
        assert!("loud".parse::<NoticeLevel>().is_err());
    }

    #[test]
    fn test_default_is_warn() {
        assert_eq!(NoticeLevel::default(), NoticeLevel::Warn);
    }
}
