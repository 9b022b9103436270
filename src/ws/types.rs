//! Wire types for the client protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands sent by clients over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsCommand {
    /// Authenticate with a bearer credential.
    Auth { token: String },
    /// Drop the authenticated session, keep the connection.
    Logout,
    /// Keepalive response.
    Pong,
}

/// A named event pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEvent {
    pub event: String,
    pub data: Value,
}

impl WsEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}
