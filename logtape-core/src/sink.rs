//! Sinks
//!
//! A sink consumes the records the pipeline routes to it; it is the
//! terminal of the pipeline. Concrete transport sinks (file, syslog,
//! OpenTelemetry, …) live outside the engine; this module carries the
//! contract plus the composition utilities the engine itself needs:
//! filter gating, buffering, an async-sink adapter, and the minimal
//! console sink backing the meta-logger fallback.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::DateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use logtape_bridge::{Console, StderrConsole};

use crate::filter::{Filter, FilterSpec};
use crate::record::LogRecord;

/// Failure reported by a sink. Sink failures never propagate to logging
/// callers; the pipeline diverts them to the meta logger.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// How a sink or filter releases its scoped resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMode {
    /// No resources to release.
    #[default]
    None,
    /// Released synchronously via `dispose`.
    Sync,
    /// Released asynchronously via `dispose_async`.
    Async,
}

/// Consumer of log records.
///
/// Infallible closures `Fn(&LogRecord)` implement this trait directly.
/// Sinks owning scoped resources report a [`DisposalMode`] and override
/// the matching hook; both hooks must be idempotent.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers one record.
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// How this sink's resources are released.
    fn disposal(&self) -> DisposalMode {
        DisposalMode::None
    }

    /// Releases resources synchronously.
    fn dispose(&self) {}

    /// Releases resources asynchronously.
    async fn dispose_async(&self) {}
}

impl<F> Sink for F
where
    F: Fn(&LogRecord) + Send + Sync,
{
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self(record);
        Ok(())
    }
}

// ==================
// === FilteredSink ===
// ==================

struct FilteredSink {
    inner: Arc<dyn Sink>,
    filter: Arc<dyn Filter>,
}

#[async_trait]
impl Sink for FilteredSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        if self.filter.accepts(record) {
            self.inner.emit(record)
        } else {
            Ok(())
        }
    }

    fn disposal(&self) -> DisposalMode {
        self.inner.disposal()
    }

    fn dispose(&self) {
        self.inner.dispose();
    }

    async fn dispose_async(&self) {
        self.inner.dispose_async().await;
    }
}

/// Gates `sink` behind a filter: records the filter rejects never reach
/// the sink. Disposal passes through to the wrapped sink.
pub fn with_filter(sink: Arc<dyn Sink>, filter: impl Into<FilterSpec>) -> Arc<dyn Sink> {
    Arc::new(FilteredSink {
        inner: sink,
        filter: filter.into().into_filter(),
    })
}

// ====================
// === BufferedSink ===
// ====================

/// Default number of records buffered before a flush.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Default interval after which a flush happens regardless of buffer
/// occupancy.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Buffers records and forwards them to the wrapped sink in batches.
///
/// A flush happens when the buffer reaches its capacity or when the flush
/// interval has elapsed since the previous flush; both conditions are
/// checked at emit time, so an idle buffer holds its records until the
/// next emit or until disposal. Disposal drains the buffer and then
/// releases the wrapped sink, so it is always asynchronous.
pub struct BufferedSink {
    inner: Arc<dyn Sink>,
    capacity: usize,
    flush_interval: Option<Duration>,
    state: Mutex<BufferState>,
}

struct BufferState {
    records: Vec<LogRecord>,
    last_flush: Instant,
}

impl BufferedSink {
    /// Wraps `inner` with the default capacity and flush interval.
    pub fn new(inner: Arc<dyn Sink>) -> Self {
        BufferedSink {
            inner,
            capacity: DEFAULT_BUFFER_SIZE,
            flush_interval: Some(DEFAULT_FLUSH_INTERVAL),
            state: Mutex::new(BufferState {
                records: Vec::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    /// Sets the number of buffered records that triggers a flush.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sets the elapsed time that triggers a flush; `None` flushes on
    /// capacity and disposal only.
    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Forwards every buffered record to the wrapped sink. Returns the
    /// first delivery error after attempting all records.
    pub fn flush(&self) -> Result<(), SinkError> {
        let drained = {
            let mut state = self.state.lock().unwrap();
            state.last_flush = Instant::now();
            std::mem::take(&mut state.records)
        };
        let mut first_error = None;
        for record in &drained {
            if let Err(error) = self.inner.emit(record) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn should_flush(&self, state: &BufferState) -> bool {
        if state.records.len() >= self.capacity {
            return true;
        }
        match self.flush_interval {
            Some(interval) => state.last_flush.elapsed() >= interval,
            None => false,
        }
    }
}

#[async_trait]
impl Sink for BufferedSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let flush_now = {
            let mut state = self.state.lock().unwrap();
            state.records.push(record.clone());
            self.should_flush(&state)
        };
        if flush_now {
            self.flush()
        } else {
            Ok(())
        }
    }

    fn disposal(&self) -> DisposalMode {
        DisposalMode::Async
    }

    async fn dispose_async(&self) {
        let _ = self.flush();
        match self.inner.disposal() {
            DisposalMode::None => {}
            DisposalMode::Sync => self.inner.dispose(),
            DisposalMode::Async => self.inner.dispose_async().await,
        }
    }
}

// =====================
// === Async adapter ===
// =====================

/// Sink whose delivery is asynchronous.
///
/// Adapt into the synchronous [`Sink`] contract with
/// [`from_async_sink`]; the adapter serializes deliveries so records
/// reach the sink in call order.
#[async_trait]
pub trait AsyncSink: Send + Sync {
    /// Delivers one record.
    async fn emit(&self, record: LogRecord) -> Result<(), SinkError>;

    /// Releases resources after the last delivery.
    async fn dispose(&self) {}
}

struct AsyncSinkAdapter {
    sender: Mutex<Option<mpsc::UnboundedSender<LogRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Sink for AsyncSinkAdapter {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let sender = self.sender.lock().unwrap();
        match sender.as_ref() {
            Some(sender) => sender
                .send(record.clone())
                .map_err(|_| SinkError::from("async sink worker has stopped")),
            None => Err(SinkError::from("async sink has been disposed")),
        }
    }

    fn disposal(&self) -> DisposalMode {
        DisposalMode::Async
    }

    async fn dispose_async(&self) {
        // Dropping the sender closes the channel; the worker drains what
        // is queued, disposes the wrapped sink, and exits.
        drop(self.sender.lock().unwrap().take());
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

/// Adapts an [`AsyncSink`] into a synchronous [`Sink`].
///
/// Records are queued to a worker task that delivers them one at a time,
/// so delivery order equals call order even across tasks. Disposal drains
/// the queue before releasing the wrapped sink. Must be called from within
/// a tokio runtime.
pub fn from_async_sink(sink: Arc<dyn AsyncSink>) -> Arc<dyn Sink> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<LogRecord>();
    let worker = tokio::spawn(async move {
        while let Some(record) = receiver.recv().await {
            if let Err(error) = sink.emit(record).await {
                eprintln!("async sink error: {error}");
            }
        }
        sink.dispose().await;
    });
    Arc::new(AsyncSinkAdapter {
        sender: Mutex::new(Some(sender)),
        worker: Mutex::new(Some(worker)),
    })
}

// ====================
// === Console sink ===
// ====================

struct ConsoleSink {
    console: Arc<dyn Console>,
}

impl ConsoleSink {
    fn format(record: &LogRecord) -> String {
        let timestamp = DateTime::from_timestamp_millis(record.timestamp())
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| record.timestamp().to_string());
        let mut line = format!(
            "[{}] {} {}: {}",
            timestamp,
            record.level().as_str().to_ascii_uppercase(),
            record.category(),
            record.rendered()
        );
        if !record.properties().is_empty() {
            let fields = serde_json::to_string(record.properties()).unwrap_or_default();
            line.push(' ');
            line.push_str(&fields);
        }
        line
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.console.write_line(&Self::format(record));
        Ok(())
    }
}

/// Renders records to text lines on the given console capability.
pub fn console_sink(console: Arc<dyn Console>) -> Arc<dyn Sink> {
    Arc::new(ConsoleSink { console })
}

/// Console sink writing to standard error; attached to the meta logger
/// when no configured logger covers it.
pub fn default_console_sink() -> Arc<dyn Sink> {
    console_sink(Arc::new(StderrConsole))
}
