//! Static mapping from connection entitlement to relayed bus channels.
//!
//! Adding a relayed topic means adding one row here; no other component
//! changes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::Identity;
use crate::bus::BusClient;

use super::{EventSink, RelayPump};

/// One channel/event pair to relay for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySpec {
    /// Bus channel to subscribe to.
    pub channel: String,
    /// Event name the payload is emitted under.
    pub event: &'static str,
    /// Whether the payload is decoded as a JSON object before forwarding.
    pub structured: bool,
}

impl RelaySpec {
    pub(crate) fn raw(channel: impl Into<String>, event: &'static str) -> Self {
        Self {
            channel: channel.into(),
            event,
            structured: false,
        }
    }

    pub(crate) fn json(channel: impl Into<String>, event: &'static str) -> Self {
        Self {
            channel: channel.into(),
            event,
            structured: true,
        }
    }
}

/// Relays every connection receives while anonymous.
pub(crate) fn anonymous_relays() -> Vec<RelaySpec> {
    vec![RelaySpec::raw("messageChannel", "hello")]
}

/// Relays for an authenticated identity, channel names keyed by user id.
pub(crate) fn identity_relays(user_id: i64) -> Vec<RelaySpec> {
    vec![
        RelaySpec::json(format!("botChannel-{user_id}"), "bot"),
        RelaySpec::json(format!("backtestChannel-{user_id}"), "backtest"),
    ]
}

/// Start the anonymous relay set under `scope`. Returns without blocking.
pub(crate) fn for_anonymous(
    bus: Arc<dyn BusClient>,
    sink: Arc<dyn EventSink>,
    scope: CancellationToken,
) {
    spawn_pumps(anonymous_relays(), bus, sink, scope);
}

/// Start the relay set for an authenticated identity under `scope`.
pub(crate) fn for_identity(
    identity: &Identity,
    bus: Arc<dyn BusClient>,
    sink: Arc<dyn EventSink>,
    scope: CancellationToken,
) {
    spawn_pumps(identity_relays(identity.id), bus, sink, scope);
}

fn spawn_pumps(
    specs: Vec<RelaySpec>,
    bus: Arc<dyn BusClient>,
    sink: Arc<dyn EventSink>,
    scope: CancellationToken,
) {
    for spec in specs {
        let pump = RelayPump::new(spec, bus.clone(), sink.clone());
        tokio::spawn(pump.run(scope.clone()));
    }
}
