use std::io::{self, Write};

use serde_json::Value;

use crate::interval::TimeRange;

/// Destination for harvested records, fed one page at a time.
pub trait RecordSink {
    fn open_window(&mut self, window: &TimeRange) -> io::Result<()>;
    fn write_page(&mut self, records: &[Value]) -> io::Result<()>;
    /// Ends the current window. Called after failures too.
    fn close_window(&mut self) -> io::Result<()>;
}

/// Writes each window as one JSON array, streamed page by page and
/// terminated by a newline.
pub struct JsonArraySink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonArraySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonArraySink<W> {
    fn open_window(&mut self, _window: &TimeRange) -> io::Result<()> {
        self.written = 0;
        self.writer.write_all(b"[")
    }

    fn write_page(&mut self, records: &[Value]) -> io::Result<()> {
        for record in records {
            if self.written > 0 {
                self.writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut self.writer, record)?;
            self.written += 1;
        }
        self.writer.flush()
    }

    fn close_window(&mut self) -> io::Result<()> {
        self.writer.write_all(b"]\n")?;
        self.writer.flush()
    }
}
