//! Output sinks
//!
//! A sink receives one serialized record per write. Every sink here takes a
//! lock around the write, so lines from concurrent operations never interleave.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination for serialized records
pub trait LogSink: Send + Sync + 'static {
    /// Write one complete line
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; the logger reports it and moves on.
    fn write_line(&self, line: &[u8]) -> io::Result<()>;

    /// Flush any buffered output
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn flush(&self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Sink that writes to stdout
#[derive(Debug)]
pub struct StdoutSink {
    /// Lock for stdout (to prevent interleaving)
    stdout: Mutex<io::Stdout>,
}

impl StdoutSink {
    /// Create a new stdout sink
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut stdout = self.stdout.lock();
        stdout.write_all(line)?;
        stdout.flush()
    }

    fn flush(&self) -> io::Result<()> {
        self.stdout.lock().flush()
    }
}

/// Sink over any [`Write`] implementation (files, buffers, `io::sink()`)
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send + 'static> LogSink for WriterSink<W> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.writer.lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

/// Sink that captures all lines in memory.
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to the logger.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    /// Create a new capture sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines, without their trailing newline
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// All captured output as one string
    #[must_use]
    pub fn contents(&self) -> String {
        self.lines.lock().iter().fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        })
    }

    /// Check if any captured line contains `text`
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(text))
    }

    /// Number of captured lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing has been captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Clear captured lines
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for CaptureSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let text = std::str::from_utf8(line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.lines
            .lock()
            .push(text.strip_suffix('\n').unwrap_or(text).to_string());

        Ok(())
    }
}
