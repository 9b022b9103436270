//! Message bus abstraction.
//!
//! [`BusClient`] is the capability handed to the relay layer: open a
//! subscription to a named channel, then pull messages from it. The process
//! constructs one client at startup and shares it read-only across all
//! pumps; each subscription handle is exclusively owned by the pump that
//! opened it and is closed by dropping it.

mod memory;
mod redis;

pub use memory::MemoryBus;
pub use redis::RedisBus;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    /// The subscription is gone and will produce no further messages.
    #[error("subscription closed")]
    Closed,

    #[error("receive failed: {0}")]
    Receive(String),
}

/// Capability over the external message bus.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Open a subscription to a named channel.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, BusError>;

    /// Liveness check used by the readiness endpoint.
    async fn ping(&self) -> Result<(), BusError>;
}

/// An open subscription to one channel. Dropping the handle closes it.
#[async_trait]
pub trait BusSubscription: Send {
    /// Block until the next message on the channel arrives.
    async fn next_message(&mut self) -> Result<String, BusError>;
}
