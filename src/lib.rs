//! casebridge -- pushes correlated security incidents from Kafka into
//! TheHive, enriched with raw and normalized events from HBase.
//!
//! One logical worker processes one message at a time: build a case,
//! enrich it, create it, publish one alert per correlated event, merge the
//! alerts, and tag the case, committing the queue offset only after the
//! whole sequence succeeds.

pub mod config;
pub mod fields;
pub mod flatten;
pub mod hive;
pub mod mapper;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::hive::HiveClient;
use crate::pipeline::{PushOutcome, Pusher};
use crate::queue::{IncidentSource, KafkaIncidentSource};
use crate::store::{EventLoader, RestEventStore};

/// Start the casebridge daemon: metrics listener plus the consume loop.
pub async fn serve(config: AppConfig) -> Result<()> {
    let metrics_addr: SocketAddr = config
        .metrics
        .listen
        .parse()
        .context("invalid metrics listen address")?;
    tokio::spawn(async move {
        if let Err(err) = metrics::serve_metrics(metrics_addr).await {
            tracing::error!(error = %err, "metrics listener failed");
        }
    });

    let store = Arc::new(RestEventStore::new(&config.store)?);
    let loader = EventLoader::new(store, &config.store);
    let api = Arc::new(HiveClient::new(&config.thehive)?);
    let pusher = Pusher::new(api, loader);
    let mut source = KafkaIncidentSource::new(&config.kafka)?;

    tracing::info!("casebridge started");
    run_loop(&mut source, &pusher).await
}

/// Consume messages one at a time, committing the offset only after a
/// message is fully processed (or dropped as malformed). Any propagated
/// error leaves the offset uncommitted so the message is redelivered.
pub async fn run_loop<S: IncidentSource>(source: &mut S, pusher: &Pusher) -> Result<()> {
    while let Some(message) = source.next_message().await? {
        metrics::RECEIVED_MESSAGES.inc();
        tracing::info!(
            topic = %message.topic,
            bytes = message.payload.len(),
            "read incident message"
        );
        match pusher.push(&message.payload).await? {
            PushOutcome::Processed {
                case_id,
                alerts_created,
                alerts_rejected,
            } => {
                tracing::info!(%case_id, alerts_created, alerts_rejected, "message processed");
            }
            PushOutcome::Malformed => {}
        }
        source.commit().await?;
    }
    Ok(())
}
