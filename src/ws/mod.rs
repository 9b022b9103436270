//! WebSocket transport for relayed events.
//!
//! Each client connection gets its own [`crate::relay::ConnectionLifecycle`];
//! the read loop dispatches auth/logout commands into it and tears everything
//! down when the socket closes.

mod handler;
mod types;

pub use handler::ws_handler;
pub use types::{WsCommand, WsEvent};
