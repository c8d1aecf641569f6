use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request lifecycle. `Pending` is the only entry state and the only state
/// with an outgoing transition; the other three are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum ConnectionType {
    Fiber,
    Copper,
    Wireless,
    Satellite,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fiber => "Fiber",
            Self::Copper => "Copper",
            Self::Wireless => "Wireless",
            Self::Satellite => "Satellite",
        };
        f.write_str(s)
    }
}

/// One resource line of a request. Lines are created with the request and
/// never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RequestLine {
    pub resource_id: i32,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NetworkRequest {
    pub request_id: i32,
    pub user_id: i32,
    pub location_id: i32,
    /// Copied from the location at creation so reports survive location edits.
    pub area_name: String,
    pub connection_type: ConnectionType,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<i32>,
    pub decided_at: Option<DateTime<Utc>>,
    pub lines: Vec<RequestLine>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRequest {
    pub location_id: i32,
    pub connection_type: ConnectionType,
    pub resources: Vec<RequestLine>,
}

/// Body of `PUT /requests/{id}/status`; only `Approved` and `Rejected` are
/// accepted there.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: RequestStatus,
}
