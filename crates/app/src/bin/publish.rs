//! One-off alarm publisher
//!
//! Publishes a well-formed alarm record to the work queue for end-to-end
//! testing. Pass a JSON record as the first argument, or run bare for a
//! sample message.

use anyhow::Context;
use chime_domain::AlarmMessage;
use chime_infra::{config, AlarmPublisher};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::load().context("loading configuration")?;

    let message = match std::env::args().nth(1) {
        Some(raw) => {
            serde_json::from_str::<AlarmMessage>(&raw).context("parsing alarm argument")?
        }
        None => AlarmMessage {
            time: "07:00".to_string(),
            date: "2025-04-18".to_string(),
            repeat: false,
            days: Vec::new(),
            label: Some("Wake up".to_string()),
        },
    };

    let publisher = AlarmPublisher::connect(&config.queue).await?;
    publisher.publish(&message).await?;
    publisher.close().await?;

    Ok(())
}
