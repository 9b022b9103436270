//! Redis pub/sub to WebSocket relay.
//!
//! Bridges bus channels to persistent client connections: messages published
//! on channels tied to a user or to the global topic are forwarded, in near
//! real time, to the connected clients entitled to see them. Entitlement is
//! established by an external HTTP auth probe; each connection owns a tree of
//! cancellation scopes that bounds the lifetime of its relays.

pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod relay;
pub mod ws;
