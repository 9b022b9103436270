//! Connection-scoped subscription lifecycle and relay engine.
//!
//! One [`ConnectionLifecycle`] per client connection owns a tree of
//! cancellation scopes: the connection scope lives from connect to
//! disconnect, and an authenticated session scope nests under it. A
//! [`RelayPump`] task per relayed channel pulls bus messages and pushes them
//! into the connection's [`EventSink`]; cancelling a scope stops every pump
//! under it and releases their bus subscriptions.

mod lifecycle;
mod pump;
mod set;

pub use lifecycle::{ConnectionLifecycle, LifecycleState};
pub use pump::RelayPump;
pub use set::RelaySpec;

use serde_json::Value;

/// Push target for relayed events.
///
/// Emission is fire-and-forget: the relay never blocks on a slow consumer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &'static str, payload: Value);
}
