//! Pull metric records back out of noisy log output.
//!
//! Records are usually interleaved with unrelated test output, sometimes
//! behind a log prefix. Any line containing the marker is treated as a
//! record whose JSON starts at the first `{` on that line.

use super::envelope::{MalformedRecordError, MetricEnvelope, MARKER};

/// One marker line and its decode outcome.
#[derive(Debug)]
pub struct ScannedRecord {
    /// 1-based line number in the scanned text.
    pub line: usize,
    pub result: Result<MetricEnvelope, MalformedRecordError>,
}

/// Decode every marker line in `text`, in order. A bad record never stops the scan.
/// Records whose `marker` field is not the marker are left out.
pub fn scan_records(text: &str) -> Vec<ScannedRecord> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.contains(MARKER))
        .filter_map(|(idx, line)| {
            let json = line.find('{').map(|start| &line[start..]).unwrap_or(line);
            let result = MetricEnvelope::decode(json.trim_end());
            match &result {
                Ok(env) if env.marker() != MARKER => {
                    // marker text appeared elsewhere in the record
                    tracing::debug!(line = idx + 1, marker = %env.marker(), "ignoring unmarked record");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(line = idx + 1, error = %e, "skipping malformed metric record");
                }
            }
            Some(ScannedRecord {
                line: idx + 1,
                result,
            })
        })
        .collect()
}
