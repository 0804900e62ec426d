//! Run log: timestamped lines written to both the console and a log file

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

/// Format of the timestamp used in line headers and default output names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time, formatted as `YYYYmmdd_HHMMSS`
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Writer that prefixes every line with a `[timestamp] ` header.
///
/// Writes do not need to be line aligned: a write that does not end with a newline leaves the
/// line open, and the next write continues it without a new header.
pub struct TimestampWriter<W> {
    /// Wrapped writer
    inner: W,
    /// Whether the next byte written starts a new line
    line_start: bool,
    /// Timestamp source
    clock: fn() -> String,
}

impl<W: Write> TimestampWriter<W> {
    /// Wrap a writer, using local time for headers
    pub fn new(inner: W) -> Self {
        Self::with_clock(inner, timestamp)
    }

    /// Wrap a writer, using a custom timestamp source for headers
    pub fn with_clock(inner: W, clock: fn() -> String) -> Self {
        Self {
            inner,
            line_start: true,
            clock,
        }
    }

    /// Unwrap the inner writer
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TimestampWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // All lines of a single write share the same header
        let header = format!("[{}] ", (self.clock)());
        let mut out = Vec::with_capacity(buf.len() + header.len());
        for line in buf.split_inclusive(|b| *b == b'\n') {
            if self.line_start {
                out.extend_from_slice(header.as_bytes());
            }
            out.extend_from_slice(line);
            self.line_start = line.ends_with(b"\n");
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writer that duplicates its output to several sinks.
///
/// A sink that fails is dropped, and output continues on the remaining ones.
#[derive(Default)]
pub struct Tee {
    /// Sink name and writer, `None` once it failed
    sinks: Vec<(String, Option<Box<dyn Write + Send>>)>,
}

impl Tee {
    /// Add a named sink
    #[must_use]
    pub fn with_sink<N, W>(mut self, name: N, writer: W) -> Self
    where
        N: Into<String>,
        W: Write + Send + 'static,
    {
        self.sinks.push((name.into(), Some(Box::new(writer))));
        self
    }

    /// Number of sinks still accepting output
    #[cfg(test)]
    #[must_use]
    pub fn active_sinks(&self) -> usize {
        self.sinks.iter().filter(|(_, w)| w.is_some()).count()
    }

    /// Apply an operation to each active sink, disabling the ones that fail
    fn for_each_sink<F>(&mut self, mut op: F)
    where
        F: FnMut(&mut dyn Write) -> io::Result<()>,
    {
        for (name, slot) in &mut self.sinks {
            if let Some(writer) = slot
                && let Err(err) = op(writer.as_mut())
            {
                log::warn!("Disabling {name} log output: {err}");
                *slot = None;
            }
        }
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.for_each_sink(|w| w.write_all(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.for_each_sink(|w| w.flush());
        Ok(())
    }
}

/// Run log writing to stdout and a log file
pub type RunLog = TimestampWriter<Tee>;

/// Open run log, appending to the log file at `path`
pub fn open(path: &Path) -> io::Result<RunLog> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let tee = Tee::default()
        .with_sink("console", io::stdout())
        .with_sink("file", file);
    Ok(TimestampWriter::new(tee))
}
