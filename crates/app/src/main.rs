//! Chime - alarm queue to calendar bridge
//!
//! Main entry point for the consumer daemon: wires the credential source,
//! the calendar sink, and the queue consumer together, then runs until a
//! shutdown signal or a fatal credential failure.

use std::sync::Arc;

use anyhow::Context;
use chime_core::{AlarmDecoder, AlarmProcessor, CredentialSource};
use chime_infra::{
    config, GoogleCalendarSink, GoogleCredentialSource, QueueConsumer, StdinPrompt,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so config and .env loading are visible
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => debug!(error = %e, "no .env file loaded"),
    }

    let config = config::load().context("loading configuration")?;

    let sink = Arc::new(GoogleCalendarSink::new(config.calendar.clone())?);
    let credentials =
        Arc::new(GoogleCredentialSource::new(config.auth.clone(), Box::new(StdinPrompt))?);

    // Establish the authorization handle before pulling any work. On first
    // run this blocks on the interactive exchange; afterwards it loads the
    // persisted record. A broken credential source aborts startup.
    credentials.access_token().await.context("acquiring authorization")?;

    let decoder = AlarmDecoder::new(sink.zone());
    let processor = Arc::new(AlarmProcessor::new(decoder, sink, credentials));

    let mut consumer = QueueConsumer::new(config.queue.clone(), processor);
    consumer.start().await?;

    info!("chime bridge running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        _ = consumer.terminated() => warn!("consumer loop ended before shutdown signal"),
    }

    consumer.stop().await?;
    Ok(())
}
