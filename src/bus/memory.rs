//! In-process bus backend.
//!
//! Serves the `memory` bus setting for local development and the test
//! suite. Channels exist implicitly; publishing to a channel nobody
//! subscribes to is a no-op, matching pub/sub semantics.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{BusClient, BusError, BusSubscription};

enum Frame {
    Message(String),
    #[cfg(test)]
    Error(String),
}

/// Channel name -> live subscriber senders.
#[derive(Default)]
pub struct MemoryBus {
    channels: DashMap<String, Vec<mpsc::UnboundedSender<Frame>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a payload to every current subscriber of `channel`.
    pub fn publish(&self, channel: &str, payload: &str) {
        if let Some(mut senders) = self.channels.get_mut(channel) {
            senders.retain(|tx| tx.send(Frame::Message(payload.to_string())).is_ok());
        }
    }

    /// Number of live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        match self.channels.get_mut(channel) {
            Some(mut senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    /// Inject a receive failure into every current subscriber of `channel`.
    #[cfg(test)]
    pub(crate) fn inject_error(&self, channel: &str, reason: &str) {
        if let Some(mut senders) = self.channels.get_mut(channel) {
            senders.retain(|tx| tx.send(Frame::Error(reason.to_string())).is_ok());
        }
    }

    /// Tear down `channel`, ending every subscription on it.
    #[cfg(test)]
    pub(crate) fn close_channel(&self, channel: &str) {
        self.channels.remove(channel);
    }
}

#[async_trait]
impl BusClient for MemoryBus {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.entry(channel.to_string()).or_default().push(tx);
        Ok(Box::new(MemorySubscription { rx }))
    }

    async fn ping(&self) -> Result<(), BusError> {
        Ok(())
    }
}

struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl BusSubscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<String, BusError> {
        match self.rx.recv().await {
            Some(Frame::Message(payload)) => Ok(payload),
            #[cfg(test)]
            Some(Frame::Error(reason)) => Err(BusError::Receive(reason)),
            None => Err(BusError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = MemoryBus::new();
        let mut first = bus.subscribe("topic").await.unwrap();
        let mut second = bus.subscribe("topic").await.unwrap();

        bus.publish("topic", "payload");

        assert_eq!(first.next_message().await.unwrap(), "payload");
        assert_eq!(second.next_message().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe("topic").await.unwrap();
        assert_eq!(bus.subscriber_count("topic"), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count("topic"), 0);
    }

    #[tokio::test]
    async fn closing_a_channel_ends_its_subscriptions() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("topic").await.unwrap();

        bus.close_channel("topic");

        assert!(matches!(
            sub.next_message().await,
            Err(BusError::Closed)
        ));
    }

    #[tokio::test]
    async fn injected_errors_do_not_end_the_subscription() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("topic").await.unwrap();

        bus.inject_error("topic", "boom");
        bus.publish("topic", "after");

        assert!(matches!(
            sub.next_message().await,
            Err(BusError::Receive(_))
        ));
        assert_eq!(sub.next_message().await.unwrap(), "after");
    }
}
