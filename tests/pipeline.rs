//! End-to-end pipeline tests against in-memory queue, store, and API fakes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use casebridge::config::StoreConfig;
use casebridge::hive::{Alert, Case, CaseApi, CreatedAlert, CreatedCase, HiveError};
use casebridge::model::{
    Collector, Correlation, EventData, EventSource, Importance, Incident, Interaction,
    NormalizedEvent, RawEvent, SeverityLevel, SourceCategory, Vendor,
};
use casebridge::pipeline::{PushOutcome, Pusher, PusherPolicies, RetryPolicy};
use casebridge::queue::{InboundMessage, IncidentSource};
use casebridge::store::{EventLoader, EventStore, StoreError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Recording fake for the case-management API.
#[derive(Default)]
struct FakeApi {
    cases: Mutex<Vec<Case>>,
    alerts: Mutex<Vec<Alert>>,
    merges: Mutex<Vec<(String, Vec<String>)>>,
    tag_updates: Mutex<Vec<(String, Vec<String>)>>,
    /// Fail this many create_case calls with a 503 before succeeding.
    case_failures: AtomicU32,
    /// Alerts whose source_ref is listed here are rejected with a 400.
    reject_refs: Mutex<HashSet<String>>,
    alert_seq: AtomicU32,
}

impl FakeApi {
    fn rejecting(refs: &[&str]) -> Self {
        let api = Self::default();
        let mut set = api.reject_refs.lock().unwrap();
        for r in refs {
            set.insert((*r).to_string());
        }
        drop(set);
        api
    }

    fn failing_case_creation(times: u32) -> Self {
        let api = Self::default();
        api.case_failures.store(times, Ordering::SeqCst);
        api
    }
}

#[async_trait::async_trait]
impl CaseApi for FakeApi {
    async fn create_case(&self, case: &Case) -> Result<CreatedCase, HiveError> {
        if self.case_failures.load(Ordering::SeqCst) > 0 {
            self.case_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(HiveError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        self.cases.lock().unwrap().push(case.clone());
        Ok(CreatedCase {
            id: "case-1".into(),
        })
    }

    async fn create_alert(&self, alert: &Alert) -> Result<CreatedAlert, HiveError> {
        if self.reject_refs.lock().unwrap().contains(&alert.source_ref) {
            return Err(HiveError::Status {
                status: 400,
                body: "invalid custom field".into(),
            });
        }
        self.alerts.lock().unwrap().push(alert.clone());
        let n = self.alert_seq.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedAlert {
            id: format!("alert-{n}"),
        })
    }

    async fn promote_alert_to_case(&self, _alert_id: &str) -> Result<CreatedCase, HiveError> {
        Ok(CreatedCase {
            id: "case-promoted".into(),
        })
    }

    async fn merge_alerts_into_case(
        &self,
        case_id: &str,
        alert_ids: &[String],
    ) -> Result<(), HiveError> {
        self.merges
            .lock()
            .unwrap()
            .push((case_id.to_string(), alert_ids.to_vec()));
        Ok(())
    }

    async fn update_case_tags(&self, case_id: &str, tags: &[String]) -> Result<(), HiveError> {
        self.tag_updates
            .lock()
            .unwrap()
            .push((case_id.to_string(), tags.to_vec()));
        Ok(())
    }
}

/// Table-keyed fake event store. Missing tables answer with no rows.
#[derive(Default)]
struct FakeStore {
    tables: HashMap<String, Vec<Vec<u8>>>,
    fail_tables: HashSet<String>,
}

#[async_trait::async_trait]
impl EventStore for FakeStore {
    async fn fetch_rows(
        &self,
        table: &str,
        _row_keys: &[String],
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        if self.fail_tables.contains(table) {
            return Err(StoreError::Timeout("scan timed out".into()));
        }
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

/// Scripted message source with a commit counter.
struct FakeSource {
    messages: VecDeque<Vec<u8>>,
    commits: u32,
}

impl FakeSource {
    fn new(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages: messages.into(),
            commits: 0,
        }
    }
}

#[async_trait::async_trait]
impl IncidentSource for FakeSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        Ok(self.messages.pop_front().map(|payload| InboundMessage {
            topic: "soc-incidents".into(),
            payload,
        }))
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn fast_policies() -> PusherPolicies {
    let fast = RetryPolicy::new(3, Duration::from_millis(1));
    PusherPolicies {
        create_case: fast,
        send_alert: fast,
        merge_alerts: fast,
        final_tag: fast,
    }
}

fn normalized_event(id: &str, raw_ids: &[&str]) -> NormalizedEvent {
    NormalizedEvent {
        id: id.into(),
        event_time: 1_600_000_000,
        event_source: EventSource {
            id: "src-7".into(),
            vendor: Vendor::Cisco,
            title: "ASA".into(),
            subsys: Some("vpn".into()),
            category: SourceCategory::Firewall,
        },
        interaction: Interaction {
            importance: Importance::High,
        },
        collector: Collector {
            organization: "acme".into(),
            hostname: "col-1".into(),
        },
        data: EventData {
            raw_ids: raw_ids.iter().map(|s| s.to_string()).collect(),
        },
        correlation: Correlation::default(),
    }
}

fn incident(event_ids: &[&str]) -> Incident {
    Incident {
        id: "inc-1".into(),
        usecase_id: "uc-77".into(),
        severity_level: SeverityLevel::High,
        correlation_rule_name: "brute-force".into(),
        detected_time: 1_700_000_000,
        correlation_event: NormalizedEvent {
            correlation: Correlation {
                name: "brute-force".into(),
                event_ids: event_ids.iter().map(|s| s.to_string()).collect(),
            },
            ..normalized_event("evt-corr", &["raw-corr"])
        },
    }
}

fn raw_row(id: &str, raw: &str) -> Vec<u8> {
    serde_json::to_vec(&RawEvent {
        id: id.into(),
        raw: raw.into(),
    })
    .unwrap()
}

fn pusher_with(api: Arc<FakeApi>, store: FakeStore) -> Pusher {
    let config = StoreConfig::default();
    let loader = EventLoader::new(Arc::new(store), &config)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));
    Pusher::with_policies(api, loader, fast_policies())
}

fn populated_store(events: &[NormalizedEvent]) -> FakeStore {
    let mut store = FakeStore::default();
    store.tables.insert(
        "soc:raw_events".into(),
        vec![raw_row("raw-corr", "corr log line")],
    );
    store.tables.insert(
        "soc:normalized_events".into(),
        events
            .iter()
            .map(|e| serde_json::to_vec(e).unwrap())
            .collect(),
    );
    store
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_sequence_creates_case_alerts_merge_and_final_tag() {
    let events = vec![
        normalized_event("evt-1", &["raw-corr"]),
        normalized_event("evt-2", &["raw-corr"]),
    ];
    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), populated_store(&events));

    let payload = serde_json::to_vec(&incident(&["evt-1", "evt-2"])).unwrap();
    let outcome = pusher.push(&payload).await.unwrap();

    assert_eq!(
        outcome,
        PushOutcome::Processed {
            case_id: "case-1".into(),
            alerts_created: 2,
            alerts_rejected: 0,
        }
    );

    let cases = api.cases.lock().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].title, "uc-77_inc-1");
    assert_eq!(cases[0].severity, 3);
    assert_eq!(cases[0].start_date, 1_700_000_000_000);
    assert!(cases[0].tags.contains(&"brute-force".to_string()));
    drop(cases);

    let alerts = api.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].source, "CISCO:ASA:vpn");
    assert_eq!(alerts[0].alert_type, "FIREWALL");
    drop(alerts);

    let merges = api.merges.lock().unwrap();
    assert_eq!(
        *merges,
        vec![(
            "case-1".to_string(),
            vec!["alert-0".to_string(), "alert-1".to_string()]
        )]
    );
    drop(merges);

    let tag_updates = api.tag_updates.lock().unwrap();
    assert_eq!(tag_updates.len(), 1);
    assert_eq!(tag_updates[0].1.last().map(String::as_str), Some("FINAL"));
}

#[tokio::test]
async fn test_rejected_alert_is_skipped_and_the_rest_still_merge() {
    let events = vec![
        normalized_event("evt-1", &[]),
        normalized_event("evt-2", &[]),
        normalized_event("evt-3", &[]),
    ];
    let api = Arc::new(FakeApi::rejecting(&["evt-2"]));
    let pusher = pusher_with(api.clone(), populated_store(&events));

    let payload = serde_json::to_vec(&incident(&["evt-1", "evt-2", "evt-3"])).unwrap();
    let outcome = pusher.push(&payload).await.unwrap();

    assert_eq!(
        outcome,
        PushOutcome::Processed {
            case_id: "case-1".into(),
            alerts_created: 2,
            alerts_rejected: 1,
        }
    );

    let merges = api.merges.lock().unwrap();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].1.len(), 2);
    drop(merges);

    // The case is still tagged FINAL despite the rejection.
    assert_eq!(api.tag_updates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_case_creation_retries_transient_failures() {
    let api = Arc::new(FakeApi::failing_case_creation(2));
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let payload = serde_json::to_vec(&incident(&[])).unwrap();
    let outcome = pusher.push(&payload).await.unwrap();

    assert!(matches!(outcome, PushOutcome::Processed { .. }));
    assert_eq!(api.cases.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_case_retried_then_tagged_with_its_original_tags() {
    let api = Arc::new(FakeApi::failing_case_creation(2));
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let payload = serde_json::to_vec(&incident(&[])).unwrap();
    pusher.push(&payload).await.unwrap();

    // The same case payload is resubmitted on every attempt, and its tags
    // survive into the final tag update.
    let tag_updates = api.tag_updates.lock().unwrap();
    assert_eq!(tag_updates.len(), 1);
    assert!(tag_updates[0].1.contains(&"brute-force".to_string()));
    assert_eq!(tag_updates[0].1.last().map(String::as_str), Some("FINAL"));
}

#[tokio::test]
async fn test_case_creation_exhausting_retries_propagates() {
    let api = Arc::new(FakeApi::failing_case_creation(u32::MAX));
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let payload = serde_json::to_vec(&incident(&[])).unwrap();
    assert!(pusher.push(&payload).await.is_err());
    assert!(api.cases.lock().unwrap().is_empty());
    assert!(api.tag_updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_correlated_events_skips_merge_but_tags_final() {
    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let payload = serde_json::to_vec(&incident(&[])).unwrap();
    let outcome = pusher.push(&payload).await.unwrap();

    assert_eq!(
        outcome,
        PushOutcome::Processed {
            case_id: "case-1".into(),
            alerts_created: 0,
            alerts_rejected: 0,
        }
    );
    assert!(api.merges.lock().unwrap().is_empty());
    assert_eq!(api.tag_updates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_outage_degrades_to_case_without_alerts() {
    let mut store = populated_store(&[normalized_event("evt-1", &[])]);
    store.fail_tables.insert("soc:normalized_events".into());
    store.fail_tables.insert("soc:raw_events".into());

    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), store);

    let payload = serde_json::to_vec(&incident(&["evt-1"])).unwrap();
    let outcome = pusher.push(&payload).await.unwrap();

    assert_eq!(
        outcome,
        PushOutcome::Processed {
            case_id: "case-1".into(),
            alerts_created: 0,
            alerts_rejected: 0,
        }
    );
    // The case still went out, with an empty raw field.
    assert_eq!(api.cases.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_payload_is_dropped_without_api_calls() {
    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), FakeStore::default());

    let outcome = pusher.push(b"{not json").await.unwrap();
    assert_eq!(outcome, PushOutcome::Malformed);
    assert!(api.cases.lock().unwrap().is_empty());
    assert!(api.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_case_raw_enrichment_joins_payloads() {
    let mut store = populated_store(&[]);
    store.tables.insert(
        "soc:raw_events".into(),
        vec![raw_row("raw-1", "line one"), raw_row("raw-2", "line two")],
    );

    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), store);

    let payload = serde_json::to_vec(&incident(&[])).unwrap();
    pusher.push(&payload).await.unwrap();

    let cases = api.cases.lock().unwrap();
    let raw = cases[0].custom_fields.get("raw").expect("raw field present");
    assert_eq!(
        raw,
        &casebridge::fields::CustomFieldValue::String("line one;\nline two".into())
    );
}

// ---------------------------------------------------------------------------
// Consume loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_loop_commits_processed_and_malformed_messages() {
    let api = Arc::new(FakeApi::default());
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let mut source = FakeSource::new(vec![
        serde_json::to_vec(&incident(&[])).unwrap(),
        b"garbage".to_vec(),
        serde_json::to_vec(&incident(&[])).unwrap(),
    ]);

    casebridge::run_loop(&mut source, &pusher).await.unwrap();
    assert_eq!(source.commits, 3);
    assert_eq!(api.cases.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_loop_does_not_commit_a_failed_message() {
    let api = Arc::new(FakeApi::failing_case_creation(u32::MAX));
    let pusher = pusher_with(api.clone(), populated_store(&[]));

    let mut source = FakeSource::new(vec![serde_json::to_vec(&incident(&[])).unwrap()]);

    assert!(casebridge::run_loop(&mut source, &pusher).await.is_err());
    assert_eq!(source.commits, 0);
}
