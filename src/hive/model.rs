//! Outbound case/alert payloads and the API's response shapes.

use serde::{Deserialize, Serialize};

use crate::fields::CustomFieldSet;

/// A case to be created. The case id is assigned by TheHive on creation
/// and comes back in [`CreatedCase`]; no alert, merge, or tag call may run
/// before that id exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub title: String,
    pub description: String,
    /// Clamped into TheHive's accepted range before submission.
    pub severity: i32,
    pub tags: Vec<String>,
    /// Epoch milliseconds.
    pub start_date: i64,
    pub custom_fields: CustomFieldSet,
    pub template: String,
}

/// One alert per normalized event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub source: String,
    pub source_ref: String,
    pub description: String,
    /// Epoch milliseconds.
    pub date: i64,
    pub severity: i32,
    pub tags: Vec<String>,
    pub case_template: String,
    pub custom_fields: CustomFieldSet,
    /// Extension point; artifact extraction is not implemented yet.
    pub artifacts: Vec<AlertArtifact>,
}

/// Observable attached to an alert.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertArtifact {
    pub data_type: String,
    pub data: String,
}

/// Creation response; only the assigned id matters downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCase {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedAlert {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::CustomFieldValue;

    #[test]
    fn test_alert_serializes_type_and_camel_case_keys() {
        let mut custom_fields = CustomFieldSet::default();
        custom_fields.push("eventTime", CustomFieldValue::Date(1_000_000));
        let alert = Alert {
            title: "evt-1".into(),
            alert_type: "FIREWALL".into(),
            source: "CISCO:ASA:vpn".into(),
            source_ref: "evt-1".into(),
            description: "src-1".into(),
            date: 1_000_000,
            severity: 3,
            tags: vec!["FIREWALL".into()],
            case_template: "Alert_template_full".into(),
            custom_fields,
            artifacts: Vec::new(),
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "FIREWALL");
        assert_eq!(value["sourceRef"], "evt-1");
        assert_eq!(value["caseTemplate"], "Alert_template_full");
        assert_eq!(value["customFields"]["eventTime"]["date"], 1_000_000);
        assert_eq!(value["artifacts"], serde_json::json!([]));
    }

    #[test]
    fn test_case_serializes_start_date_and_custom_fields() {
        let case = Case {
            title: "uc-1_inc-1".into(),
            description: "src".into(),
            severity: 1,
            tags: vec![],
            start_date: 42_000,
            custom_fields: CustomFieldSet::default(),
            template: "Case_template_full".into(),
        };
        let value = serde_json::to_value(&case).unwrap();
        assert_eq!(value["startDate"], 42_000);
        assert_eq!(value["customFields"], serde_json::json!({}));
    }
}
