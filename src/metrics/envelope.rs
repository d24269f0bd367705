/// Type-tagged metric records.
///
/// Every record carries the fixed marker, a metric name and a `type`
/// discriminator. The payload fields for the selected type sit flattened
/// beside them on the wire:
///
/// `{"marker":"cluster_loader_marker","name":"pod-startup","type":"TestDuration","startTime":"2024-01-01T00:00:00Z","testDuration":"1.5s"}`
///
/// Decoding reads the discriminator first and only then decodes the payload
/// it names. Unknown types decode to an envelope with no payload.
use super::duration::{self, FormatError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel carried by every record so log consumers can filter them out of noise.
pub const MARKER: &str = "cluster_loader_marker";

/// Discriminator for the start-time + duration payload.
pub const TEST_DURATION_TYPE: &str = "TestDuration";

/// The `type` field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadType {
    TestDuration,
    /// A type this build does not know how to decode.
    Unknown(String),
}

impl PayloadType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            TEST_DURATION_TYPE => PayloadType::TestDuration,
            other => PayloadType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PayloadType::TestDuration => TEST_DURATION_TYPE,
            PayloadType::Unknown(tag) => tag,
        }
    }
}

/// Elapsed time of one measured operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDuration {
    pub start_time: DateTime<Utc>,
    pub duration: TimeDelta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    TestDuration(TestDuration),
}

/// One metric record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEnvelope {
    marker: String,
    name: String,
    payload_type: PayloadType,
    payload: Option<Payload>,
}

/// A record could not be decoded.
#[derive(Debug)]
pub enum MalformedRecordError {
    /// The input is not JSON, or the marker/name/type fields have the wrong shape.
    Header { source: serde_json::Error },
    /// The payload fields selected by the type are missing or mistyped.
    Payload {
        payload_type: String,
        source: serde_json::Error,
    },
    /// The `testDuration` field is not a valid duration string.
    Duration { source: FormatError },
}

impl std::fmt::Display for MalformedRecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedRecordError::Header { source } => {
                write!(f, "malformed metric record: {source}")
            }
            MalformedRecordError::Payload {
                payload_type,
                source,
            } => write!(f, "malformed {payload_type} payload: {source}"),
            MalformedRecordError::Duration { source } => {
                write!(f, "malformed metric record: {source}")
            }
        }
    }
}

impl std::error::Error for MalformedRecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MalformedRecordError::Header { source } => Some(source),
            MalformedRecordError::Payload { source, .. } => Some(source),
            MalformedRecordError::Duration { source } => Some(source),
        }
    }
}

impl From<FormatError> for MalformedRecordError {
    fn from(e: FormatError) -> Self {
        MalformedRecordError::Duration { source: e }
    }
}

// --- Wire shapes ---

#[derive(Serialize)]
struct WireRecord<'a> {
    marker: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    payload_type: &'a str,
    #[serde(flatten)]
    payload: Option<WireTestDuration>,
}

/// Discriminator fields only; decoded before anything else.
#[derive(Deserialize)]
struct WireHeader {
    #[serde(default)]
    marker: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    payload_type: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTestDuration {
    start_time: DateTime<Utc>,
    test_duration: String,
}

impl MetricEnvelope {
    /// Build a `TestDuration` record for a measurement that began at `start_time`.
    pub fn test_duration(
        name: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Self {
        Self {
            marker: MARKER.to_string(),
            name: name.into(),
            payload_type: PayloadType::TestDuration,
            payload: Some(Payload::TestDuration(TestDuration {
                start_time,
                duration,
            })),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_type(&self) -> &PayloadType {
        &self.payload_type
    }

    /// Present exactly when the payload type is recognized.
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn test_duration_payload(&self) -> Option<&TestDuration> {
        match self.payload() {
            Some(Payload::TestDuration(td)) => Some(td),
            None => None,
        }
    }

    /// Serialize to a single-line JSON object.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = match &self.payload {
            Some(Payload::TestDuration(td)) => Some(WireTestDuration {
                start_time: td.start_time,
                test_duration: duration::encode(td.duration),
            }),
            None => None,
        };
        serde_json::to_string(&WireRecord {
            marker: &self.marker,
            name: &self.name,
            payload_type: self.payload_type.as_str(),
            payload,
        })
    }

    /// Decode one record: discriminator fields first, then the payload they select.
    pub fn decode(input: &str) -> Result<Self, MalformedRecordError> {
        let value: Value =
            serde_json::from_str(input).map_err(|e| MalformedRecordError::Header { source: e })?;
        Self::decode_value(value)
    }

    fn decode_value(value: Value) -> Result<Self, MalformedRecordError> {
        // serde's struct visitor would also fill the header from an array by position
        let unexpected = match &value {
            Value::Object(_) => None,
            Value::Array(_) => Some(Unexpected::Seq),
            Value::String(s) => Some(Unexpected::Str(s)),
            Value::Bool(b) => Some(Unexpected::Bool(*b)),
            Value::Number(_) => Some(Unexpected::Other("number")),
            Value::Null => Some(Unexpected::Unit),
        };
        if let Some(unexpected) = unexpected {
            return Err(MalformedRecordError::Header {
                source: de::Error::invalid_type(unexpected, &"a metric record object"),
            });
        }

        let header: WireHeader = WireHeader::deserialize(&value)
            .map_err(|e| MalformedRecordError::Header { source: e })?;

        let payload_type = PayloadType::from_tag(&header.payload_type);
        let payload = match payload_type {
            PayloadType::TestDuration => {
                let wire = WireTestDuration::deserialize(&value).map_err(|e| {
                    MalformedRecordError::Payload {
                        payload_type: header.payload_type.clone(),
                        source: e,
                    }
                })?;
                Some(Payload::TestDuration(TestDuration {
                    start_time: wire.start_time,
                    duration: duration::decode(&wire.test_duration)?,
                }))
            }
            PayloadType::Unknown(ref tag) => {
                tracing::debug!(payload_type = %tag, "skipping payload of unknown type");
                None
            }
        };

        Ok(Self {
            marker: header.marker,
            name: header.name,
            payload_type,
            payload,
        })
    }
}
