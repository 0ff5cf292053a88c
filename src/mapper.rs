//! Derivation of TheHive cases and alerts from domain records.
//!
//! Every rule here is a fixed extraction; nothing in this module talks to
//! the network or mutates shared state.

use crate::fields::build_custom_fields;
use crate::flatten::flatten;
use crate::hive::{Alert, Case};
use crate::model::{Incident, NormalizedEvent};

// TODO: template names depend on the use case and organization; make them
// configurable once multi-tenant templates land.
pub const CASE_TEMPLATE: &str = "Case_template_full";
pub const ALERT_TEMPLATE: &str = "Alert_template_full";

/// TheHive accepts severities starting at 1, while wire levels start at 0.
/// Levels 0 and 1 collapse to 1; anything above maps to `level - 1`.
pub fn clamp_severity(level: i32) -> i32 {
    if level > 1 {
        level - 1
    } else {
        1
    }
}

/// Build an alert from one normalized event.
pub fn prepare_alert(event: &NormalizedEvent) -> Alert {
    Alert {
        title: event.id.clone(),
        alert_type: event.event_source.category.name().to_string(),
        source: alert_source(event),
        source_ref: event.id.clone(),
        // Placeholder: a richer description source (references) is still
        // an open item upstream.
        description: event.event_source.id.clone(),
        date: event.event_time * 1000,
        severity: clamp_severity(event.interaction.importance.level()),
        tags: alert_tags(event),
        case_template: ALERT_TEMPLATE.to_string(),
        custom_fields: build_custom_fields(&flatten(event)),
        artifacts: Vec::new(),
    }
}

/// Build a case from an incident.
pub fn prepare_case(incident: &Incident) -> Case {
    Case {
        title: format!("{}_{}", incident.usecase_id, incident.id),
        description: incident.correlation_event.event_source.id.clone(),
        severity: clamp_severity(incident.severity_level.level()),
        tags: case_tags(incident),
        start_date: incident.detected_time * 1000,
        custom_fields: build_custom_fields(&flatten(incident)),
        template: CASE_TEMPLATE.to_string(),
    }
}

/// The whole event source collapses into `vendor:title:subsystem`.
fn alert_source(event: &NormalizedEvent) -> String {
    let source = &event.event_source;
    [
        source.vendor.name(),
        source.title.as_str(),
        source.subsys.as_deref().unwrap_or(""),
    ]
    .join(":")
}

fn alert_tags(event: &NormalizedEvent) -> Vec<String> {
    vec![
        event.event_source.category.name().to_string(),
        event.event_source.vendor.name().to_string(),
        event.event_source.title.clone(),
        event.interaction.importance.name().to_string(),
    ]
}

fn case_tags(incident: &Incident) -> Vec<String> {
    vec![
        incident.correlation_event.collector.organization.clone(),
        incident.correlation_rule_name.clone(),
        incident.usecase_id.clone(),
        incident.severity_level.name().to_string(),
    ]
}
