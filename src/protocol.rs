//! Messages exchanged with observers over the WebSocket bridge
//!
//! All messages are JSON objects tagged by `type`:
//!
//! ```text
//! client → server   {"type":"start"} | {"type":"stop"} | {"type":"get_status"}
//!                   {"type":"set_permission","granted":true}
//! server → client   {"type":"status", ...snapshot fields}
//!                   {"type":"error","message":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::monitor::MonitorSnapshot;

/// Commands an observer may issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Start,
    Stop,
    GetStatus,
    SetPermission { granted: bool },
}

/// Messages pushed to observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status(MonitorSnapshot),
    Error { message: String },
}

/// Body of `POST /api/permission`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}
