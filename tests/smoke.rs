//! Facade-level smoke test: the re-exported API wires end to end.

use std::sync::{Arc, Mutex};

use serde_json::json;

use logtape::bridge::ThreadLocalContextStorage;
use logtape::{
    configure, get_logger, reset, with_context, Config, Level, LogRecord, LoggerConfig, Message,
    Properties, Sink, SinkError,
};

#[derive(Default)]
struct CollectorSink {
    records: Mutex<Vec<LogRecord>>,
}

impl Sink for CollectorSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_configure_log_and_reset_through_facade() {
    let collector = Arc::new(CollectorSink::default());
    configure(
        Config::builder()
            .sink("out", collector.clone())
            .logger(
                LoggerConfig::new(["facade-app"])
                    .with_sinks(["out"])
                    .with_lowest_level(Level::Info),
            )
            .context_local_storage(Arc::new(ThreadLocalContextStorage))
            .build(),
    )
    .await
    .unwrap();

    with_context(
        [("request".to_string(), json!("r-9"))].into_iter().collect(),
        || {
            let logger = get_logger(["facade-app", "worker"]);
            logger.debug("below threshold");
            logger.info(Message::fmt("{task} finished", {
                let mut props = Properties::new();
                props.insert("task".to_string(), json!("import"));
                props
            }));
        },
    );

    let records = collector.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rendered(), "import finished");
    assert_eq!(records[0].properties().get("request"), Some(&json!("r-9")));
    drop(records);

    reset().await;
    assert!(!logtape::is_configured());
}
