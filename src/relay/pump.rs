//! Per-channel relay loop.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::bus::{BusClient, BusError};

use super::{EventSink, RelaySpec};

/// Relays one bus channel to one connection until its scope is cancelled or
/// the subscription is unrecoverably lost.
pub struct RelayPump {
    spec: RelaySpec,
    bus: Arc<dyn BusClient>,
    sink: Arc<dyn EventSink>,
}

impl RelayPump {
    pub fn new(spec: RelaySpec, bus: Arc<dyn BusClient>, sink: Arc<dyn EventSink>) -> Self {
        Self { spec, bus, sink }
    }

    /// Run until `scope` is cancelled. The subscription handle is dropped on
    /// exit, which closes it.
    pub async fn run(self, scope: CancellationToken) {
        let mut subscription = tokio::select! {
            _ = scope.cancelled() => return,
            result = self.bus.subscribe(&self.spec.channel) => match result {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!("subscribe to {} failed: {}", self.spec.channel, err);
                    return;
                }
            },
        };
        debug!("relay started: {} -> {}", self.spec.channel, self.spec.event);

        loop {
            let received = tokio::select! {
                _ = scope.cancelled() => break,
                received = subscription.next_message() => received,
            };

            // Cancellation is observed between receives: a message already
            // pulled off the bus is dropped once the scope is gone.
            if scope.is_cancelled() {
                break;
            }

            match received {
                Ok(payload) => self.forward(payload),
                Err(BusError::Closed) => {
                    info!("subscription to {} closed", self.spec.channel);
                    break;
                }
                // Transient receive failures retry immediately.
                Err(err) => warn!("receive on {} failed: {}", self.spec.channel, err),
            }
        }

        debug!("relay stopped: {} -> {}", self.spec.channel, self.spec.event);
    }

    fn forward(&self, payload: String) {
        if self.spec.structured {
            match serde_json::from_str::<Map<String, Value>>(&payload) {
                Ok(decoded) => self.sink.emit(self.spec.event, Value::Object(decoded)),
                // One bad message never stops the pump.
                Err(err) => warn!(
                    "dropping malformed payload on {}: {}",
                    self.spec.channel, err
                ),
            }
        } else {
            self.sink.emit(self.spec.event, Value::String(payload));
        }
    }
}
