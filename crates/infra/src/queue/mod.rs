//! Durable queue transport (AMQP via lapin)
//!
//! The work queue is declared as a durable quorum queue with a
//! `x-delivery-limit` argument: the broker counts deliveries of each message
//! and dead-letters it past the cap, which bounds redelivery without an
//! application-side retry counter.

pub mod consumer;
pub mod publisher;

use chime_domain::{BridgeError, QueueConfig, Result};
use lapin::options::QueueDeclareOptions;
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{Channel, Connection, ConnectionProperties};

/// Open a broker connection for the configured endpoint.
pub async fn connect(config: &QueueConfig) -> Result<Connection> {
    let uri = config.amqp_uri();
    Connection::connect(&uri, ConnectionProperties::default())
        .await
        .map_err(|e| BridgeError::Queue(format!("failed to connect to {}: {e}", config.host)))
}

/// Declare the durable work queue with broker-enforced delivery bounding.
pub async fn declare_queue(channel: &Channel, config: &QueueConfig) -> Result<()> {
    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() },
            queue_arguments(config.delivery_limit),
        )
        .await
        .map_err(|e| BridgeError::Queue(format!("failed to declare queue {}: {e}", config.queue)))?;
    Ok(())
}

fn queue_arguments(delivery_limit: u32) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(ShortString::from("x-queue-type"), AMQPValue::LongString("quorum".into()));
    args.insert(ShortString::from("x-delivery-limit"), AMQPValue::LongInt(delivery_limit as i32));
    args
}

/// Broker-maintained delivery count for quorum-queue redeliveries, when
/// present in the message headers.
pub(crate) fn delivery_count(headers: Option<&FieldTable>) -> Option<i64> {
    let table = headers?;
    table
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == "x-delivery-count")
        .and_then(|(_, value)| match value {
            AMQPValue::LongInt(v) => Some(i64::from(*v)),
            AMQPValue::LongUInt(v) => Some(i64::from(*v)),
            AMQPValue::LongLongInt(v) => Some(*v),
            AMQPValue::ShortInt(v) => Some(i64::from(*v)),
            AMQPValue::ShortUInt(v) => Some(i64::from(*v)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_arguments_request_quorum_with_delivery_limit() {
        let args = queue_arguments(5);
        let inner = args.inner();

        assert_eq!(
            inner.get(&ShortString::from("x-queue-type")),
            Some(&AMQPValue::LongString("quorum".into()))
        );
        assert_eq!(
            inner.get(&ShortString::from("x-delivery-limit")),
            Some(&AMQPValue::LongInt(5))
        );
    }

    #[test]
    fn delivery_count_reads_integer_header_variants() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("x-delivery-count"), AMQPValue::LongInt(3));
        assert_eq!(delivery_count(Some(&headers)), Some(3));

        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("x-delivery-count"), AMQPValue::LongLongInt(7));
        assert_eq!(delivery_count(Some(&headers)), Some(7));
    }

    #[test]
    fn delivery_count_absent_without_header() {
        assert_eq!(delivery_count(None), None);
        assert_eq!(delivery_count(Some(&FieldTable::default())), None);

        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("x-delivery-count"), AMQPValue::LongString("3".into()));
        assert_eq!(delivery_count(Some(&headers)), None);
    }
}
