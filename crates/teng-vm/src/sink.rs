//! The output sink abstraction.

use std::io;

/// Where rendered output goes. The VM treats a failed write as fatal for
/// the current page.
pub trait Sink {
    fn write_str(&mut self, text: &str) -> io::Result<()>;
}

/// Collects output into an owned string.
#[derive(Debug, Default)]
pub struct StringSink {
    buf: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

impl Sink for StringSink {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.buf.push_str(text);
        Ok(())
    }
}

/// Adapts any `io::Write` into a sink.
pub struct WriterSink<W: io::Write> {
    writer: W,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: io::Write> Sink for WriterSink<W> {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }
}
