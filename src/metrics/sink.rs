/// Line-oriented metric output: one encoded record per line, in order.
use super::envelope::MetricEnvelope;
use std::io::Write;

/// Errors produced while emitting records.
#[derive(Debug)]
pub enum SinkError {
    /// A record could not be serialized.
    Encode {
        name: String,
        source: serde_json::Error,
    },
    /// The underlying writer failed.
    Io { source: std::io::Error },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Encode { name, source } => {
                write!(f, "failed to encode metric {name:?}: {source}")
            }
            SinkError::Io { source } => write!(f, "failed to write metric record: {source}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Encode { source, .. } => Some(source),
            SinkError::Io { source } => Some(source),
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io { source: e }
    }
}

/// Writes metric records to a byte sink.
pub struct MetricSink<W: Write> {
    writer: W,
}

impl<W: Write> MetricSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write every record, one line each, stopping at the first failure.
    ///
    /// Records already written before a failure stay written; nothing after
    /// the failing record is attempted.
    pub fn emit_all(&mut self, records: &[MetricEnvelope]) -> Result<(), SinkError> {
        for record in records {
            self.emit(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Write a single record as one line.
    pub fn emit(&mut self, record: &MetricEnvelope) -> Result<(), SinkError> {
        let mut line = record.encode().map_err(|e| SinkError::Encode {
            name: record.name().to_string(),
            source: e,
        })?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        tracing::debug!(name = record.name(), "emitted metric record");
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
