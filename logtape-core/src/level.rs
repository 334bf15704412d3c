//! Severity Levels
//!
//! Six totally ordered severities plus the per-logger threshold type with
//! its disabled sentinel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Severity of a log record.
///
/// Levels are totally ordered: `Trace < Debug < Info < Warning < Error <
/// Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// All levels, lowest severity first.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Lowercase name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    /// Parses a level name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(Error::InvalidLevel(s.to_string())),
        }
    }
}

/// Per-logger severity threshold.
///
/// `Minimum(level)` accepts records at `level` and above; `Disabled`
/// rejects everything. The default threshold accepts all records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelThreshold {
    Minimum(Level),
    Disabled,
}

impl LevelThreshold {
    /// Whether a record at `level` passes this threshold.
    pub fn accepts(&self, level: Level) -> bool {
        match self {
            LevelThreshold::Minimum(minimum) => level >= *minimum,
            LevelThreshold::Disabled => false,
        }
    }
}

impl Default for LevelThreshold {
    fn default() -> Self {
        LevelThreshold::Minimum(Level::Trace)
    }
}

impl From<Level> for LevelThreshold {
    fn from(level: Level) -> Self {
        LevelThreshold::Minimum(level)
    }
}

impl fmt::Display for LevelThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelThreshold::Minimum(level) => level.fmt(f),
            LevelThreshold::Disabled => f.write_str("disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_total_order() {
        for window in Level::ALL.windows(2) {
            assert!(window[0] < window[1]);
        }
        assert!(Level::Trace < Level::Fatal);
        assert_eq!(Level::Info.cmp(&Level::Info), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("WaRnInG".parse::<Level>().unwrap(), Level::Warning);
    }

    #[test]
    fn test_parse_unknown_token_fails() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert!(matches!(err, Error::InvalidLevel(token) if token == "verbose"));
    }

    #[test]
    fn test_display_round_trips() {
        for level in Level::ALL {
            assert_eq!(level.to_string().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn test_default_threshold_accepts_everything() {
        let threshold = LevelThreshold::default();
        for level in Level::ALL {
            assert!(threshold.accepts(level));
        }
    }

    #[test]
    fn test_minimum_threshold_gates_below() {
        let threshold = LevelThreshold::Minimum(Level::Warning);
        assert!(!threshold.accepts(Level::Info));
        assert!(threshold.accepts(Level::Warning));
        assert!(threshold.accepts(Level::Fatal));
    }

    #[test]
    fn test_disabled_rejects_everything() {
        for level in Level::ALL {
            assert!(!LevelThreshold::Disabled.accepts(level));
        }
    }

    #[test]
    fn test_serde_lowercase_names() {
        assert_eq!(serde_json::to_string(&Level::Warning).unwrap(), "\"warning\"");
        assert_eq!(
            serde_json::from_str::<Level>("\"fatal\"").unwrap(),
            Level::Fatal
        );
    }
}
