//! Queue consumer with explicit lifecycle management
//!
//! Receives deliveries from the durable work queue and drives each one
//! through the [`AlarmProcessor`] to a terminal acknowledgement. Each
//! delivery is processed to completion before its tag is resolved, so no two
//! create-event calls are ever in flight for the same tag. Cancellation is
//! explicit and the task join is bounded.

use std::sync::Arc;
use std::time::Duration;

use chime_core::{AlarmProcessor, Disposition, Outcome};
use chime_domain::{BridgeError, QueueConfig, Result};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, Consumer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{connect, declare_queue, delivery_count};

const CONSUMER_TAG: &str = "chime-consumer";
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_REPLY_SUCCESS: u16 = 200;

/// Alarm queue consumer with start/stop lifecycle.
pub struct QueueConsumer {
    config: QueueConfig,
    processor: Arc<AlarmProcessor>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl QueueConsumer {
    pub fn new(config: QueueConfig, processor: Arc<AlarmProcessor>) -> Self {
        Self { config, processor, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Connect, declare the durable queue, and spawn the consume loop.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(BridgeError::Internal("consumer already running".to_string()));
        }

        let connection = connect(&self.config).await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BridgeError::Queue(format!("failed to open channel: {e}")))?;

        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BridgeError::Queue(format!("failed to set prefetch: {e}")))?;

        declare_queue(&channel, &self.config).await?;

        let consumer = channel
            .basic_consume(
                &self.config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BridgeError::Queue(format!("failed to start consuming: {e}")))?;

        info!(queue = %self.config.queue, "consuming alarm requests");

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let processor = Arc::clone(&self.processor);

        let handle = tokio::spawn(async move {
            Self::consume_loop(consumer, channel, connection, processor, cancel).await;
        });
        self.task_handle = Some(handle);

        Ok(())
    }

    /// Cancel the loop and wait for it to drain, bounded by a join timeout.
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping queue consumer");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(BridgeError::Internal(format!("consumer task panicked: {e}")))
                }
                Err(_) => {
                    return Err(BridgeError::Internal(
                        "consumer task did not stop within timeout".to_string(),
                    ))
                }
            }
        }

        info!("Queue consumer stopped");
        Ok(())
    }

    /// Resolve when the consume loop exits on its own (fatal credential
    /// failure or a broker-closed stream).
    pub async fn terminated(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "consumer task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn consume_loop(
        mut consumer: Consumer,
        channel: Channel,
        connection: Connection,
        processor: Arc<AlarmProcessor>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("consume loop cancelled");
                    break;
                }
                delivery = consumer.next() => {
                    let delivery = match delivery {
                        Some(Ok(delivery)) => delivery,
                        Some(Err(e)) => {
                            error!(error = %e, "broker delivery error, stopping consumer");
                            break;
                        }
                        None => {
                            warn!("consume stream closed by broker");
                            break;
                        }
                    };

                    // The delivery is driven to its terminal ack/nack here,
                    // before the next one is pulled.
                    let fatal = Self::handle_delivery(&processor, delivery).await;
                    if fatal {
                        break;
                    }
                }
            }
        }

        if let Err(e) = channel.close(CLOSE_REPLY_SUCCESS, "shutting down").await {
            debug!(error = %e, "channel close failed");
        }
        if let Err(e) = connection.close(CLOSE_REPLY_SUCCESS, "shutting down").await {
            debug!(error = %e, "connection close failed");
        }
    }

    /// Process one delivery and resolve its tag. Returns true when the loop
    /// must halt (credential source failure).
    async fn handle_delivery(processor: &Arc<AlarmProcessor>, delivery: Delivery) -> bool {
        let delivery_tag = delivery.delivery_tag;
        let redeliveries = delivery_count(delivery.properties.headers().as_ref());

        let outcome = processor.process(&delivery.data).await;

        let resolve = match outcome.disposition() {
            Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
            Disposition::Reject => {
                delivery.acker.reject(BasicRejectOptions { requeue: false }).await
            }
            Disposition::Requeue => {
                delivery.acker.nack(BasicNackOptions { requeue: true, multiple: false }).await
            }
        };

        if let Err(e) = resolve {
            error!(delivery_tag, error = %e, "failed to resolve delivery, stopping consumer");
            return true;
        }

        match &outcome {
            Outcome::Created(event) => {
                info!(delivery_tag, event_id = %event.id, outcome = "created", "alarm processed");
            }
            Outcome::RejectedPermanent(reason) => {
                warn!(
                    delivery_tag,
                    reason = %reason,
                    outcome = "rejected-permanent",
                    "alarm dropped"
                );
            }
            Outcome::Requeued(reason) => {
                warn!(
                    delivery_tag,
                    reason = %reason,
                    delivery_count = redeliveries,
                    outcome = "requeued",
                    "alarm returned to broker"
                );
            }
            Outcome::AuthFailure(err) => {
                error!(
                    delivery_tag,
                    error = %err,
                    "credential source failed, halting consumer"
                );
            }
        }

        outcome.is_fatal()
    }
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("QueueConsumer dropped while running, cancelling task");
            self.cancellation.cancel();
        }
    }
}
