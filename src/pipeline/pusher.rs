//! Per-message orchestration: build, enrich, publish, merge, tag.
//!
//! Each message runs the full sequence before the next one is read. The
//! failure semantics differ per stage: parse failures drop the message,
//! enrichment failures degrade to empty results, a rejected alert skips
//! only that alert, and everything else propagates so the offset is never
//! committed for a half-published incident.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::retry::RetryPolicy;
use crate::hive::{Alert, CaseApi, HiveError};
use crate::mapper;
use crate::metrics;
use crate::model::{Incident, NormalizedEvent};
use crate::store::{Enrichment, EventLoader};

/// Tag appended to a case once every publish step has completed.
pub const FINAL_TAG: &str = "FINAL";

/// Per-stage retry policies. Case creation gets the most patient budget
/// since nothing else can proceed without the case id.
#[derive(Debug, Clone, Copy)]
pub struct PusherPolicies {
    pub create_case: RetryPolicy,
    pub send_alert: RetryPolicy,
    pub merge_alerts: RetryPolicy,
    pub final_tag: RetryPolicy,
}

impl Default for PusherPolicies {
    fn default() -> Self {
        Self {
            create_case: RetryPolicy::new(10, Duration::from_secs(6)),
            send_alert: RetryPolicy::new(5, Duration::from_secs(2)),
            merge_alerts: RetryPolicy::new(5, Duration::from_secs(2)),
            final_tag: RetryPolicy::new(5, Duration::from_secs(2)),
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The full sequence completed; safe to commit the offset.
    Processed {
        case_id: String,
        alerts_created: usize,
        alerts_rejected: usize,
    },
    /// The payload did not parse. Dropped on purpose: committing it keeps
    /// a poison message from being redelivered forever.
    Malformed,
}

pub struct Pusher {
    api: Arc<dyn CaseApi>,
    loader: EventLoader,
    policies: PusherPolicies,
}

impl Pusher {
    pub fn new(api: Arc<dyn CaseApi>, loader: EventLoader) -> Self {
        Self::with_policies(api, loader, PusherPolicies::default())
    }

    pub fn with_policies(
        api: Arc<dyn CaseApi>,
        loader: EventLoader,
        policies: PusherPolicies,
    ) -> Self {
        Self {
            api,
            loader,
            policies,
        }
    }

    /// Process one incident message end to end.
    pub async fn push(&self, payload: &[u8]) -> Result<PushOutcome> {
        let _timer = metrics::FULL_PROCESSING_SECONDS.start_timer();

        // Parse. Malformed input aborts this message only.
        let incident: Incident = match serde_json::from_slice(payload) {
            Ok(incident) => incident,
            Err(err) => {
                warn!(error = %err, "incident message is not valid, dropping");
                return Ok(PushOutcome::Malformed);
            }
        };

        // Build the case and enrich it with the incident's raw payloads.
        let mut case = {
            let _timer = metrics::CASE_PREPARING_SECONDS.start_timer();
            let mut case = mapper::prepare_case(&incident);
            let raw = self
                .loader
                .raw_events(&incident.correlation_event.data.raw_ids)
                .await;
            case.custom_fields.add_string("raw", self.join_raw(raw, "case"));
            case
        };

        // Create the case; the assigned id gates every later call. The
        // retry closure captures a reference so the case stays usable for
        // the final tag update below.
        let case_ref = &case;
        let created = self
            .policies
            .create_case
            .run(
                "create_case",
                || async move {
                    let _timer = metrics::CREATE_CASE_SECONDS.start_timer();
                    let result = self.api.create_case(case_ref).await;
                    if let Err(err) = &result {
                        metrics::API_ERRORS.inc();
                        warn!(error = %err, "create case failed");
                    }
                    result
                },
                HiveError::is_retryable,
            )
            .await?;
        let case_id = created.id;
        metrics::CREATED_CASES.inc();
        info!(%case_id, title = %case.title, "created case");

        // Best-effort: an incident may end up with a case and zero alerts.
        let normalized = self
            .loader
            .normalized_events(&incident.correlation_event.correlation.event_ids)
            .await;
        let events = match normalized {
            Enrichment::Loaded(events) => events,
            Enrichment::Skipped { reason } => {
                warn!(%reason, "normalized event lookup skipped, continuing without alerts");
                Vec::new()
            }
        };

        let mut alert_ids = Vec::new();
        let mut alerts_rejected = 0usize;
        for event in &events {
            let alert = self.prepare_alert(event).await;
            match self.send_alert(&alert).await {
                Ok(id) => {
                    metrics::CREATED_ALERTS.inc();
                    info!(alert_id = %id, source_ref = %alert.source_ref, "created alert");
                    alert_ids.push(id);
                }
                // One rejected alert must not fail the whole incident.
                Err(err) if err.is_rejected() => {
                    metrics::REJECTED_ALERTS.inc();
                    warn!(source_ref = %alert.source_ref, error = %err, "alert rejected, skipping");
                    alerts_rejected += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !alert_ids.is_empty() {
            self.merge_alerts(&case_id, &alert_ids).await?;
            metrics::MERGED_ALERTS.inc_by(alert_ids.len() as u64);
        }

        case.tags.push(FINAL_TAG.to_string());
        self.set_final_tag(&case_id, &case.tags).await?;

        metrics::PROCESSED_MESSAGES.inc();
        info!(%case_id, alerts = alert_ids.len(), "successfully processed incident message");
        Ok(PushOutcome::Processed {
            case_id,
            alerts_created: alert_ids.len(),
            alerts_rejected,
        })
    }

    /// Build an alert and enrich it with its own raw payloads.
    async fn prepare_alert(&self, event: &NormalizedEvent) -> Alert {
        let _timer = metrics::ALERT_PREPARING_SECONDS.start_timer();
        let mut alert = mapper::prepare_alert(event);
        let raw = self.loader.raw_events(&event.data.raw_ids).await;
        if raw.is_loaded() {
            metrics::ENRICHED_ALERTS.inc();
        }
        alert
            .custom_fields
            .add_string("raw", self.join_raw(raw, "alert"));
        alert
    }

    fn join_raw(&self, raw: Enrichment<Vec<String>>, scope: &str) -> String {
        match raw {
            Enrichment::Loaded(events) => events.join(";\n"),
            Enrichment::Skipped { reason } => {
                warn!(scope, %reason, "raw event enrichment skipped");
                String::new()
            }
        }
    }

    async fn send_alert(&self, alert: &Alert) -> Result<String, HiveError> {
        self.policies
            .send_alert
            .run(
                "send_alert",
                || async move {
                    let _timer = metrics::SEND_ALERT_SECONDS.start_timer();
                    let result = self.api.create_alert(alert).await;
                    if let Err(err) = &result {
                        metrics::API_ERRORS.inc();
                        warn!(error = %err, "create alert failed");
                    }
                    result.map(|created| created.id)
                },
                HiveError::is_retryable,
            )
            .await
    }

    async fn merge_alerts(&self, case_id: &str, alert_ids: &[String]) -> Result<(), HiveError> {
        self.policies
            .merge_alerts
            .run(
                "merge_alerts",
                || async move {
                    let _timer = metrics::MERGE_ALERTS_SECONDS.start_timer();
                    let result = self.api.merge_alerts_into_case(case_id, alert_ids).await;
                    if let Err(err) = &result {
                        metrics::API_ERRORS.inc();
                        warn!(error = %err, "merge alerts failed");
                    }
                    result
                },
                HiveError::is_retryable,
            )
            .await
    }

    async fn set_final_tag(&self, case_id: &str, tags: &[String]) -> Result<(), HiveError> {
        self.policies
            .final_tag
            .run(
                "set_final_tag",
                || async move {
                    let _timer = metrics::SET_FINAL_TAG_SECONDS.start_timer();
                    let result = self.api.update_case_tags(case_id, tags).await;
                    if let Err(err) = &result {
                        metrics::API_ERRORS.inc();
                        warn!(error = %err, "set final tag failed");
                    }
                    result
                },
                HiveError::is_retryable,
            )
            .await
    }
}
