//! Per-connection lifecycle state machine.
//!
//! Owns the nested cancellation scopes for one client connection: the
//! connection scope created on connect and, after a successful probe, a
//! session scope as its child. Cancelling the connection scope cascades into
//! the session scope and every pump under either.

use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthProbe, Identity};
use crate::bus::BusClient;

use super::{EventSink, set};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Connection scope live, anonymous relays only.
    Connected,
    /// Connection and session scopes both live.
    Authenticated,
    /// All scopes cancelled. Terminal.
    Closed,
}

pub struct ConnectionLifecycle {
    bus: Arc<dyn BusClient>,
    probe: Arc<dyn AuthProbe>,
    sink: Arc<dyn EventSink>,
    connection_scope: CancellationToken,
    session_scope: Option<CancellationToken>,
    identity: Option<Identity>,
    state: LifecycleState,
}

impl ConnectionLifecycle {
    /// Handle the connect event: create the connection scope and start the
    /// anonymous relays under it.
    pub fn connect(
        bus: Arc<dyn BusClient>,
        probe: Arc<dyn AuthProbe>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let connection_scope = CancellationToken::new();
        set::for_anonymous(bus.clone(), sink.clone(), connection_scope.clone());
        Self {
            bus,
            probe,
            sink,
            connection_scope,
            session_scope: None,
            identity: None,
            state: LifecycleState::Connected,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Handle an authenticate event. Probe failure leaves the connection in
    /// its current state; success replaces any live session with a fresh one.
    pub async fn authenticate(&mut self, credential: &str) {
        if self.state == LifecycleState::Closed {
            return;
        }

        let identity = match self.probe.check(credential).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!("authentication failed: {}", err);
                return;
            }
        };

        // A repeated auth replaces the running session so the same identity's
        // topics are never delivered twice.
        if let Some(previous) = self.session_scope.take() {
            previous.cancel();
        }

        let session_scope = self.connection_scope.child_token();
        set::for_identity(
            &identity,
            self.bus.clone(),
            self.sink.clone(),
            session_scope.clone(),
        );
        info!("authenticated user {}", identity.id);

        self.session_scope = Some(session_scope);
        self.identity = Some(identity);
        self.state = LifecycleState::Authenticated;
    }

    /// Handle a logout event: cancel the session scope, keep the anonymous
    /// relays running.
    pub fn logout(&mut self) {
        if let Some(session) = self.session_scope.take() {
            session.cancel();
        }
        self.identity = None;
        if self.state == LifecycleState::Authenticated {
            self.state = LifecycleState::Connected;
        }
    }

    /// Handle the disconnect event: cancel the connection scope, which
    /// cascades into any live session scope and every pump. Idempotent.
    pub fn disconnect(&mut self) {
        self.connection_scope.cancel();
        self.session_scope = None;
        self.identity = None;
        self.state = LifecycleState::Closed;
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        // Pumps must not outlive the connection even if the handler unwinds.
        self.connection_scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::bus::MemoryBus;
    use crate::relay::testing::{RecordingSink, StaticProbe, identity, wait_until};

    use super::*;

    fn connected(id: i64) -> (Arc<MemoryBus>, Arc<RecordingSink>, ConnectionLifecycle) {
        let bus = Arc::new(MemoryBus::new());
        let sink = Arc::new(RecordingSink::default());
        let probe = Arc::new(StaticProbe {
            credential: "valid",
            identity: identity(id),
        });
        let lifecycle = ConnectionLifecycle::connect(bus.clone(), probe, sink.clone());
        (bus, sink, lifecycle)
    }

    #[tokio::test]
    async fn connect_starts_the_anonymous_relay() {
        let (bus, sink, _lifecycle) = connected(42);

        wait_until(|| bus.subscriber_count("messageChannel") == 1).await;
        bus.publish("messageChannel", "hi");

        wait_until(|| sink.count() == 1).await;
        assert_eq!(sink.events(), vec![("hello", json!("hi"))]);
    }

    #[tokio::test]
    async fn authenticate_starts_identity_relays() {
        let (bus, sink, mut lifecycle) = connected(42);

        lifecycle.authenticate("valid").await;
        assert_eq!(lifecycle.state(), LifecycleState::Authenticated);
        assert_eq!(lifecycle.identity().map(|i| i.id), Some(42));

        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;
        wait_until(|| bus.subscriber_count("backtestChannel-42") == 1).await;

        bus.publish("botChannel-42", r#"{"x":1}"#);
        wait_until(|| sink.count() == 1).await;
        assert_eq!(sink.events(), vec![("bot", json!({"x": 1}))]);
    }

    #[tokio::test]
    async fn other_users_channels_are_not_delivered() {
        let (bus, sink, mut lifecycle) = connected(42);
        lifecycle.authenticate("valid").await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;

        bus.publish("botChannel-7", r#"{"x":1}"#);
        bus.publish("botChannel-42", r#"{"x":2}"#);

        wait_until(|| sink.count() >= 1).await;
        assert_eq!(sink.events(), vec![("bot", json!({"x": 2}))]);
    }

    #[tokio::test]
    async fn failed_authentication_is_a_local_no_op() {
        let (bus, _sink, mut lifecycle) = connected(42);
        wait_until(|| bus.subscriber_count("messageChannel") == 1).await;

        lifecycle.authenticate("wrong").await;
        assert_eq!(lifecycle.state(), LifecycleState::Connected);
        assert!(lifecycle.identity().is_none());
        assert_eq!(bus.subscriber_count("botChannel-42"), 0);
        assert_eq!(bus.subscriber_count("messageChannel"), 1);

        // A later valid attempt still succeeds.
        lifecycle.authenticate("valid").await;
        assert_eq!(lifecycle.state(), LifecycleState::Authenticated);
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;
    }

    #[tokio::test]
    async fn logout_stops_only_the_session_relays() {
        let (bus, sink, mut lifecycle) = connected(42);
        wait_until(|| bus.subscriber_count("messageChannel") == 1).await;
        lifecycle.authenticate("valid").await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;
        wait_until(|| bus.subscriber_count("backtestChannel-42") == 1).await;

        lifecycle.logout();
        assert_eq!(lifecycle.state(), LifecycleState::Connected);
        assert!(lifecycle.identity().is_none());

        wait_until(|| bus.subscriber_count("botChannel-42") == 0).await;
        wait_until(|| bus.subscriber_count("backtestChannel-42") == 0).await;
        assert_eq!(bus.subscriber_count("messageChannel"), 1);

        bus.publish("messageChannel", "still here");
        wait_until(|| sink.count() == 1).await;
        assert_eq!(sink.events(), vec![("hello", json!("still here"))]);
    }

    #[tokio::test]
    async fn reauthentication_replaces_the_session() {
        let (bus, sink, mut lifecycle) = connected(42);
        lifecycle.authenticate("valid").await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;

        lifecycle.authenticate("valid").await;

        // The previous session's pumps stop; exactly one subscription per
        // identity channel remains.
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;
        assert_eq!(bus.subscriber_count("backtestChannel-42"), 1);

        bus.publish("botChannel-42", r#"{"x":1}"#);
        wait_until(|| sink.count() >= 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.events(), vec![("bot", json!({"x": 1}))]);
    }

    #[tokio::test]
    async fn disconnect_stops_everything() {
        let (bus, sink, mut lifecycle) = connected(42);
        wait_until(|| bus.subscriber_count("messageChannel") == 1).await;
        lifecycle.authenticate("valid").await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 1).await;

        lifecycle.disconnect();
        assert_eq!(lifecycle.state(), LifecycleState::Closed);

        wait_until(|| bus.subscriber_count("messageChannel") == 0).await;
        wait_until(|| bus.subscriber_count("botChannel-42") == 0).await;
        wait_until(|| bus.subscriber_count("backtestChannel-42") == 0).await;

        let before = sink.count();
        bus.publish("messageChannel", "late");
        bus.publish("botChannel-42", r#"{"x":1}"#);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.count(), before);

        // Closed is terminal: further transitions are no-ops.
        lifecycle.disconnect();
        lifecycle.authenticate("valid").await;
        assert_eq!(lifecycle.state(), LifecycleState::Closed);
        assert_eq!(bus.subscriber_count("botChannel-42"), 0);
    }

    #[tokio::test]
    async fn dropping_the_lifecycle_cancels_its_pumps() {
        let (bus, _sink, lifecycle) = connected(42);
        wait_until(|| bus.subscriber_count("messageChannel") == 1).await;

        drop(lifecycle);
        wait_until(|| bus.subscriber_count("messageChannel") == 0).await;
    }
}
