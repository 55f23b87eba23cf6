//! Sinks for trapped panic reports
//!
//! Every trapped panic is written to the configured [`PanicLogger`] as
//! `"panic: <value>\n<stack>"`, independent of what the client is shown.

use crate::error::Result;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// A sink accepting formatted panic text.
///
/// Implementations are shared between concurrent requests and must be safe
/// for concurrent writes.
pub trait PanicLogger: Send + Sync + 'static {
    fn log(&self, entry: &str) -> Result<()>;
}

impl<T: PanicLogger + ?Sized> PanicLogger for Arc<T> {
    fn log(&self, entry: &str) -> Result<()> {
        (**self).log(entry)
    }
}

/// Writes entries to the process standard error stream
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrLogger;

impl PanicLogger for StderrLogger {
    fn log(&self, entry: &str) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(entry.as_bytes())?;
        stderr.flush()?;
        Ok(())
    }
}

/// Forwards entries to `tracing` at error level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl PanicLogger for TracingLogger {
    fn log(&self, entry: &str) -> Result<()> {
        tracing::error!(target: "recoverer", "{}", entry.trim_end());
        Ok(())
    }
}

/// Wraps any `Write` behind a mutex, one `write_all` per entry.
#[derive(Debug, Default)]
pub struct WriterLogger<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> PanicLogger for WriterLogger<W> {
    fn log(&self, entry: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(entry.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps entries in memory. Handy for tests and for surfacing recent
/// panics on an admin endpoint.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl PanicLogger for MemoryLogger {
    fn log(&self, entry: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.to_string());
        Ok(())
    }
}

/// Writes `entry` to `logger`, reporting sink failures through tracing
/// instead of failing the request.
pub(crate) fn write_entry(logger: Option<&dyn PanicLogger>, entry: &str) {
    if let Some(logger) = logger {
        if let Err(e) = logger.log(entry) {
            tracing::warn!("Failed to write panic log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_logger_appends_entries() {
        let logger = WriterLogger::new(Vec::new());
        logger.log("panic: one\n").unwrap();
        logger.log("panic: two\n").unwrap();
        let written = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(written, "panic: one\npanic: two\n");
    }

    #[test]
    fn test_memory_logger_through_arc() {
        let memory = Arc::new(MemoryLogger::new());
        let shared: Arc<dyn PanicLogger> = memory.clone();

        write_entry(Some(shared.as_ref()), "panic: boom\n");
        write_entry(None, "panic: dropped\n");

        assert_eq!(memory.entries(), vec!["panic: boom\n".to_string()]);
        memory.clear();
        assert!(memory.is_empty());
    }

    struct FailingLogger;

    impl PanicLogger for FailingLogger {
        fn log(&self, _entry: &str) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        // must not panic
        write_entry(Some(&FailingLogger), "panic: boom\n");
    }
}
