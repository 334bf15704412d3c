//! Record Filters
//!
//! A filter is a predicate over a log record. Severity levels lift to
//! predicates ("accept at or above this level"), and configuration accepts
//! either form through [`FilterSpec`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::level::{Level, LevelThreshold};
use crate::record::LogRecord;
use crate::sink::DisposalMode;

/// Predicate over log records.
///
/// Closures `Fn(&LogRecord) -> bool` implement this trait directly.
/// Filters that own scoped resources override the disposal hooks; both
/// hooks must be idempotent.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Whether `record` should continue through the pipeline.
    fn accepts(&self, record: &LogRecord) -> bool;

    /// How this filter's resources are released.
    fn disposal(&self) -> DisposalMode {
        DisposalMode::None
    }

    /// Releases resources synchronously.
    fn dispose(&self) {}

    /// Releases resources asynchronously.
    async fn dispose_async(&self) {}
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn accepts(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

/// Lifts a severity threshold into a predicate. The disabled sentinel
/// yields a predicate that rejects every record.
pub fn level_filter(threshold: impl Into<LevelThreshold>) -> Arc<dyn Filter> {
    let threshold = threshold.into();
    Arc::new(move |record: &LogRecord| threshold.accepts(record.level()))
}

/// Either form a filter can take in a configuration: a ready predicate or
/// a severity to lift.
#[derive(Clone)]
pub enum FilterSpec {
    Filter(Arc<dyn Filter>),
    Level(LevelThreshold),
}

impl FilterSpec {
    /// The predicate form of this spec.
    pub fn into_filter(self) -> Arc<dyn Filter> {
        match self {
            FilterSpec::Filter(filter) => filter,
            FilterSpec::Level(threshold) => level_filter(threshold),
        }
    }
}

impl From<Level> for FilterSpec {
    fn from(level: Level) -> Self {
        FilterSpec::Level(LevelThreshold::Minimum(level))
    }
}

impl From<LevelThreshold> for FilterSpec {
    fn from(threshold: LevelThreshold) -> Self {
        FilterSpec::Level(threshold)
    }
}

impl From<Arc<dyn Filter>> for FilterSpec {
    fn from(filter: Arc<dyn Filter>) -> Self {
        FilterSpec::Filter(filter)
    }
}

/// Normalizes a predicate-or-severity into the predicate form.
pub fn to_filter(spec: impl Into<FilterSpec>) -> Arc<dyn Filter> {
    spec.into().into_filter()
}

impl std::fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterSpec::Filter(_) => f.write_str("FilterSpec::Filter(..)"),
            FilterSpec::Level(threshold) => write!(f, "FilterSpec::Level({threshold})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Properties;

    fn record(level: Level) -> LogRecord {
        LogRecord::new("test", level, "msg", Properties::new())
    }

    #[test]
    fn test_closure_is_a_filter() {
        let filter: Arc<dyn Filter> =
            Arc::new(|record: &LogRecord| record.level() >= Level::Error);
        assert!(!filter.accepts(&record(Level::Info)));
        assert!(filter.accepts(&record(Level::Fatal)));
        assert_eq!(filter.disposal(), DisposalMode::None);
    }

    #[test]
    fn test_level_filter_accepts_at_or_above() {
        let filter = level_filter(Level::Warning);
        assert!(!filter.accepts(&record(Level::Info)));
        assert!(filter.accepts(&record(Level::Warning)));
        assert!(filter.accepts(&record(Level::Error)));
    }

    #[test]
    fn test_disabled_threshold_rejects_all() {
        let filter = level_filter(LevelThreshold::Disabled);
        for level in Level::ALL {
            assert!(!filter.accepts(&record(level)));
        }
    }

    #[test]
    fn test_to_filter_lifts_levels() {
        let filter = to_filter(Level::Info);
        assert!(!filter.accepts(&record(Level::Debug)));
        assert!(filter.accepts(&record(Level::Info)));
    }

    #[test]
    fn test_to_filter_passes_predicates_through() {
        let predicate: Arc<dyn Filter> = Arc::new(|record: &LogRecord| {
            record.properties().contains_key("req_id")
        });
        let filter = to_filter(FilterSpec::Filter(predicate));

        let mut properties = Properties::new();
        properties.insert("req_id".to_string(), "r1".into());
        let tagged = LogRecord::new("test", Level::Info, "msg", properties);

        assert!(filter.accepts(&tagged));
        assert!(!filter.accepts(&record(Level::Info)));
    }
}
