//! Broadcast of local orders and withdrawals on the gossip topic.

use bytes::Bytes;
use std::sync::Arc;
use swapbook_sdk::objects::{Envelope, ObjectError, WireObject};
use tracing::debug;

use crate::net::{NetError, PubSub};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] ObjectError),
    #[error("failed to publish on {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: NetError,
    },
}

#[derive(Clone)]
pub struct BroadcastPublisher {
    pubsub: Arc<dyn PubSub>,
    topic: String,
}

impl BroadcastPublisher {
    pub fn new(pubsub: Arc<dyn PubSub>, topic: impl Into<String>) -> Self {
        Self {
            pubsub,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let data = Bytes::from(envelope.to_bytes()?);
        let len = data.len();
        self.pubsub
            .publish(&self.topic, data)
            .await
            .map_err(|source| PublishError::Publish {
                topic: self.topic.clone(),
                source,
            })?;
        debug!(topic = %self.topic, message_type = %envelope.message_type(), len, "Published envelope");
        Ok(())
    }
}
