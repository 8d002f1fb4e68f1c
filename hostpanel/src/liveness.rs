use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, de};
use serde_json::Value;
use shared::config::HealthContract;
use shared_http::api::{HealthResponse, PingResponse};
use tracing::warn;

/// Tri-state liveness of the managed host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Not determined yet, or the backend is still checking
    #[default]
    Unknown,
    Online,
    Offline,
}

impl Liveness {
    /// Classify a `/ping` style `detail` indicator.
    pub fn from_detail(detail: Option<i64>) -> Self {
        match detail {
            Some(1) => Liveness::Online,
            Some(0) => Liveness::Offline,
            None => Liveness::Unknown,
            Some(other) => {
                warn!("Unexpected ping detail {}, treating host as offline", other);
                Liveness::Offline
            }
        }
    }

    /// Classify a legacy `/health` style `status` indicator.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("ok") => Liveness::Online,
            _ => Liveness::Offline,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Liveness::Online)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Liveness::Unknown => "Unknown",
            Liveness::Online => "Online",
            Liveness::Offline => "Offline",
        };
        f.write_str(label)
    }
}

/// Decode a health response body according to `contract`.
///
/// Only a JSON object is a health response; arrays and scalars are decode errors.
pub fn decode_health(contract: HealthContract, body: &[u8]) -> Result<Liveness, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(de::Error::invalid_type(unexpected(&value), &"a JSON object"));
    }

    match contract {
        HealthContract::Detail => {
            let ping: PingResponse = serde_json::from_value(value)?;
            Ok(Liveness::from_detail(ping.detail))
        }
        HealthContract::Status => {
            let health: HealthResponse = serde_json::from_value(value)?;
            Ok(Liveness::from_status(health.status.as_deref()))
        }
    }
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}

/// Latest published result of a poller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollState {
    pub value: Liveness,
    /// When the most recent check completed, successful or not
    pub last_updated: Option<DateTime<Utc>>,
    /// Sequence number of the check that produced this state; 0 before the first one
    pub checks: u64,
}
