//! Correlated incidents as delivered on the incident topic.

use serde::{Deserialize, Serialize};

use crate::flatten::{message, Field, FieldValue, FlatValue, Record};
use crate::model::event::NormalizedEvent;

/// Incident severity assigned by the correlation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SeverityLevel {
    pub fn name(self) -> &'static str {
        match self {
            SeverityLevel::Unknown => "UNKNOWN",
            SeverityLevel::Info => "INFO",
            SeverityLevel::Low => "LOW",
            SeverityLevel::Medium => "MEDIUM",
            SeverityLevel::High => "HIGH",
            SeverityLevel::Critical => "CRITICAL",
        }
    }

    /// Numeric wire level: UNKNOWN = 0 up to CRITICAL = 5.
    pub fn level(self) -> i32 {
        match self {
            SeverityLevel::Unknown => 0,
            SeverityLevel::Info => 1,
            SeverityLevel::Low => 2,
            SeverityLevel::Medium => 3,
            SeverityLevel::High => 4,
            SeverityLevel::Critical => 5,
        }
    }
}

/// Top-level correlation record: one case is created per incident.
///
/// Immutable once parsed; lives for the duration of one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub usecase_id: String,
    pub severity_level: SeverityLevel,
    pub correlation_rule_name: String,
    /// Unix seconds.
    pub detected_time: i64,
    pub correlation_event: NormalizedEvent,
}

impl Record for Incident {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field {
                name: "id",
                value: FieldValue::Scalar(FlatValue::Text(self.id.clone())),
            },
            Field {
                name: "usecaseId",
                value: FieldValue::Scalar(FlatValue::Text(self.usecase_id.clone())),
            },
            Field {
                name: "severityLevel",
                value: FieldValue::Enum(self.severity_level.name()),
            },
            Field {
                name: "correlationRuleName",
                value: FieldValue::Scalar(FlatValue::Text(self.correlation_rule_name.clone())),
            },
            Field {
                name: "detectedTime",
                value: FieldValue::Scalar(FlatValue::Int(self.detected_time)),
            },
            Field {
                name: "correlationEvent",
                value: message(&self.correlation_event),
            },
        ]
    }
}
