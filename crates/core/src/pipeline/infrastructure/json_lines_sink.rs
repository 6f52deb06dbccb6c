use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::pipeline::frame_result::FrameResult;
use crate::pipeline::result_sink::{ResultSink, SinkError};

/// Writes one JSON object per frame, newline separated.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) `path` and writes results to it.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &result)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
