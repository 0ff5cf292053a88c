//! Prometheus counters, per-stage histograms, and the scrape endpoint.
//!
//! The metrics listener runs on its own task and shares nothing with the
//! pipeline beyond the registry's atomics.

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

pub static RECEIVED_MESSAGES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_received_messages_total",
        "Incident messages read from the queue"
    )
    .unwrap()
});

pub static CREATED_CASES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("casebridge_created_cases_total", "Cases created in TheHive").unwrap()
});

pub static CREATED_ALERTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_created_alerts_total",
        "Alerts created in TheHive"
    )
    .unwrap()
});

pub static MERGED_ALERTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_merged_alerts_total",
        "Alerts merged into their case"
    )
    .unwrap()
});

pub static REJECTED_ALERTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_rejected_alerts_total",
        "Alerts skipped after the API rejected the payload"
    )
    .unwrap()
});

pub static ENRICHED_ALERTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_enriched_alerts_total",
        "Alerts enriched with raw payloads from the store"
    )
    .unwrap()
});

pub static LOADED_RAW_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_loaded_raw_events_total",
        "Raw events loaded from the store"
    )
    .unwrap()
});

pub static LOADED_NORMALIZED_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_loaded_normalized_events_total",
        "Normalized events loaded from the store"
    )
    .unwrap()
});

pub static STORE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_store_errors_total",
        "Store lookups that failed after retries"
    )
    .unwrap()
});

pub static API_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_api_errors_total",
        "Failed TheHive API call attempts"
    )
    .unwrap()
});

pub static PROCESSED_MESSAGES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "casebridge_processed_messages_total",
        "Messages processed end to end"
    )
    .unwrap()
});

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

pub static FULL_PROCESSING_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_full_processing_seconds",
        "End-to-end processing time per message"
    )
    .unwrap()
});

pub static CASE_PREPARING_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_case_preparing_seconds",
        "Time to build and enrich a case"
    )
    .unwrap()
});

pub static ALERT_PREPARING_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_alert_preparing_seconds",
        "Time to build and enrich an alert"
    )
    .unwrap()
});

pub static CREATE_CASE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_create_case_seconds",
        "Create-case API call duration"
    )
    .unwrap()
});

pub static SEND_ALERT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_send_alert_seconds",
        "Create-alert API call duration"
    )
    .unwrap()
});

pub static MERGE_ALERTS_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_merge_alerts_seconds",
        "Merge-alerts API call duration"
    )
    .unwrap()
});

pub static SET_FINAL_TAG_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_set_final_tag_seconds",
        "Final tag update API call duration"
    )
    .unwrap()
});

pub static STORE_LOADING_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "casebridge_store_loading_seconds",
        "Store batch lookup duration"
    )
    .unwrap()
});

// ---------------------------------------------------------------------------
// Scrape endpoint
// ---------------------------------------------------------------------------

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/health", get(health))
}

/// Serve `/metrics` and `/health` until the process exits.
pub async fn serve_metrics(addr: SocketAddr) -> Result<()> {
    tracing::info!(%addr, "metrics listener starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}

async fn scrape() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
