//! Producer utility for the alarm queue
//!
//! Publishes well-formed alarm records to the same durable queue the consumer
//! reads, with persistent delivery mode. Auxiliary tooling: the bridge itself
//! never publishes.

use chime_domain::{AlarmMessage, BridgeError, QueueConfig, Result};
use lapin::options::BasicPublishOptions;
use lapin::types::ShortString;
use lapin::{BasicProperties, Channel, Connection};
use tracing::info;
use uuid::Uuid;

use super::{connect, declare_queue};

const PERSISTENT_DELIVERY_MODE: u8 = 2;
const CLOSE_REPLY_SUCCESS: u16 = 200;

/// Publisher bound to the configured work queue.
pub struct AlarmPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AlarmPublisher {
    /// Connect and declare the durable queue (idempotent with the consumer's
    /// declaration).
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let connection = connect(config).await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BridgeError::Queue(format!("failed to open channel: {e}")))?;

        declare_queue(&channel, config).await?;

        Ok(Self { connection, channel, queue: config.queue.clone() })
    }

    /// Publish one alarm record as a persistent JSON message.
    pub async fn publish(&self, message: &AlarmMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| BridgeError::Internal(format!("cannot serialize alarm: {e}")))?;

        let message_id = Uuid::new_v4().to_string();
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(message_id.clone()));

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| BridgeError::Queue(format!("publish failed: {e}")))?
            .await
            .map_err(|e| BridgeError::Queue(format!("publish not confirmed: {e}")))?;

        info!(queue = %self.queue, message_id = %message_id, "alarm published");
        Ok(())
    }

    /// Close the connection cleanly.
    pub async fn close(self) -> Result<()> {
        self.connection
            .close(CLOSE_REPLY_SUCCESS, "done")
            .await
            .map_err(|e| BridgeError::Queue(format!("close failed: {e}")))
    }
}
