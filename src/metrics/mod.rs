//! Structured metric records: duration text codec, the type-tagged
//! envelope, line-oriented output and marker scanning.
pub mod duration;
pub mod envelope;
pub mod scan;
pub mod sink;

pub use envelope::MetricEnvelope;
pub use sink::MetricSink;
