use crate::protocol::StatusCategory;
use serde::{Deserialize, Serialize};

/// Request body for PUT /api/targets/{id}/command
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// Request body for PUT /api/targets/{id}/interval.
/// Accepts either a JSON number or the raw text typed by the user.
#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub interval: serde_json::Value,
}

impl IntervalRequest {
    pub fn as_input(&self) -> String {
        match &self.interval {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Response for GET /api/targets/{id}/status
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: String,
    pub category: StatusCategory,
}
