//! Redis pub/sub backend.

use async_trait::async_trait;
use futures::StreamExt;
use redis::Client;
use redis::aio::PubSub;

use super::{BusClient, BusError, BusSubscription};

/// Bus backend over Redis pub/sub.
///
/// The client handle is cheap to share; every subscription gets its own
/// pub/sub connection because Redis dedicates a connection to subscriber
/// mode.
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(url: &str) -> Result<Self, BusError> {
        let client = Client::open(url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BusClient for RedisBus {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn BusSubscription>, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        Ok(Box::new(RedisSubscription { pubsub }))
    }

    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

struct RedisSubscription {
    pubsub: PubSub,
}

#[async_trait]
impl BusSubscription for RedisSubscription {
    async fn next_message(&mut self) -> Result<String, BusError> {
        let mut stream = self.pubsub.on_message();
        match stream.next().await {
            Some(msg) => {
                let payload: String = msg.get_payload()?;
                Ok(payload)
            }
            None => Err(BusError::Closed),
        }
    }
}
