//! Publishing and subscribing to chatroom channels

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::events::{ChannelEvent, Envelope};
use crate::RealtimeResult;

pub type EventStream = BoxStream<'static, Envelope>;

/// A pub/sub relay keyed by channel name.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish an event and return how many subscribers the broker reported.
    async fn publish(&self, channel: &str, event: &ChannelEvent) -> RealtimeResult<usize>;

    async fn subscribe(&self, channel: &str) -> RealtimeResult<EventStream>;
}

/// Redis pub/sub. Publishing shares one managed connection; each subscription opens its own.
#[derive(Clone)]
pub struct RedisBroadcaster {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBroadcaster {
    pub async fn connect(url: &str) -> RealtimeResult<Self> {
        let client = redis::Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, event: &ChannelEvent) -> RealtimeResult<usize> {
        let payload = serde_json::to_string(&event.to_envelope()?)?;
        let mut conn = self.publisher.clone();
        let receivers: usize = conn.publish(channel, payload).await?;
        debug!(channel, event = event.name(), receivers, "published to redis");
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> RealtimeResult<EventStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let channel = channel.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let channel = channel.clone();
            async move {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(channel, error = %error, "unreadable broker payload");
                        return None;
                    }
                };
                match serde_json::from_str::<Envelope>(&payload) {
                    Ok(envelope) => Some(envelope),
                    Err(error) => {
                        warn!(channel, error = %error, "dropping malformed broker event");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// In-process relay for single-node deployments and tests.
#[derive(Clone)]
pub struct LocalBroadcaster {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Envelope>>>>,
    capacity: usize,
}

impl LocalBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for LocalBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, channel: &str, event: &ChannelEvent) -> RealtimeResult<usize> {
        let envelope = event.to_envelope()?;

        let mut channels = self.channels.write().await;
        let receivers = match channels.get(channel) {
            Some(sender) => match sender.send(envelope) {
                Ok(receivers) => receivers,
                Err(_) => {
                    // every subscriber has gone away
                    channels.remove(channel);
                    0
                }
            },
            None => 0,
        };

        debug!(channel, event = event.name(), receivers, "published locally");
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> RealtimeResult<EventStream> {
        let receiver = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let channel = channel.to_string();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            let channel = channel.clone();
            async move {
                match item {
                    Ok(envelope) => Some(envelope),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "subscriber lagged behind");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}
