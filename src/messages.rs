// Request/response bodies for the control API

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{MAX_HEADING_ABS_DEG, MAX_SEGMENT_DISTANCE_FT};
use crate::motor::{MotorPlan, SerialLog};

/// Caller-chosen identity. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Result<Self, RequestError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RequestError::MissingIdentity);
        }
        Ok(Self(id))
    }

    /// Validate an optional identity field from a request body
    pub fn from_field(field: Option<String>) -> Result<Self, RequestError> {
        field.map_or(Err(RequestError::MissingIdentity), Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input validation failures; reported as `ok:false` with no state change.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("missing or empty client identity")]
    MissingIdentity,

    #[error("missing or unknown command")]
    UnknownCommand,

    #[error("segment {index}: {reason}")]
    MalformedSegment { index: usize, reason: &'static str },

    #[error("malformed body: {0}")]
    Body(String),
}

/// One drawn path segment, in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    #[serde(default)]
    pub distance_feet: f64,
    #[serde(default)]
    pub heading_degrees: f64,
}

impl PathSegment {
    pub fn new(distance_feet: f64, heading_degrees: f64) -> Self {
        Self {
            distance_feet,
            heading_degrees,
        }
    }
}

/// Reject segments the planner cannot turn into motion
pub fn validate_segments(segments: &[PathSegment]) -> Result<(), RequestError> {
    for (index, seg) in segments.iter().enumerate() {
        if !seg.distance_feet.is_finite() || !seg.heading_degrees.is_finite() {
            return Err(RequestError::MalformedSegment {
                index,
                reason: "non-finite value",
            });
        }
        if seg.distance_feet < 0.0 {
            return Err(RequestError::MalformedSegment {
                index,
                reason: "negative distance",
            });
        }
        if seg.distance_feet > MAX_SEGMENT_DISTANCE_FT {
            return Err(RequestError::MalformedSegment {
                index,
                reason: "distance too large",
            });
        }
        if seg.heading_degrees.abs() > MAX_HEADING_ABS_DEG {
            return Err(RequestError::MalformedSegment {
                index,
                reason: "heading out of range",
            });
        }
    }
    Ok(())
}

/// Joystick-style command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ManualCommand {
    Forward,
    Left,
    Right,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executed,
    Queued,
}

// ---- request bodies ----
// Identity and command are optional at the serde level so a missing field is
// reported as a bad request in the API's own shape instead of a decode error.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRequest {
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualDriveRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl ManualDriveRequest {
    pub fn command(&self) -> Result<ManualCommand, RequestError> {
        let raw = self.command.as_deref().ok_or(RequestError::UnknownCommand)?;
        serde_json::from_value(serde_json::Value::String(raw.to_string()))
            .map_err(|_| RequestError::UnknownCommand)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPathRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub segments: Vec<PathSegment>,
}

// ---- responses ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub ok: bool,
    pub granted: bool,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub ok: bool,
    pub released: bool,
    pub owner: Option<ClientId>,
    pub queue: Vec<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub is_owner: bool,
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub current_owner: Option<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualDriveResponse {
    pub ok: bool,
    pub status: ExecutionStatus,
    pub command: ManualCommand,
    pub serial_log: SerialLog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPathResponse {
    pub ok: bool,
    pub status: ExecutionStatus,
    pub motor_plan: MotorPlan,
    pub serial_log: SerialLog,
    pub queue: Vec<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStateResponse {
    pub is_busy: bool,
    pub queue: Vec<ClientId>,
    pub current_owner: Option<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub detail: String,
}

impl From<&RequestError> for ErrorResponse {
    fn from(err: &RequestError) -> Self {
        Self {
            ok: false,
            error: "bad request".to_string(),
            detail: err.to_string(),
        }
    }
}
