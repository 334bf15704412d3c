//! Console Output Capability
//!
//! Line-oriented console output, injected so the engine never touches the
//! process's standard streams directly. The fallback meta-logger sink in
//! `logtape-core` renders records to text and hands the lines here.

use std::fmt;

/// Destination for rendered console lines.
pub trait Console: Send + Sync {
    /// Writes one rendered log line.
    fn write_line(&self, line: &str);
}

/// Console implementation writing to standard error.
///
/// Standard error is used rather than standard output so diagnostics do
/// not interleave with a host application's data output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrConsole;

impl Console for StderrConsole {
    fn write_line(&self, line: &str) {
        eprintln!("{line}");
    }
}

impl fmt::Display for StderrConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StderrConsole")
    }
}
