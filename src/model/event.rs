//! Normalized and raw security events.

use serde::{Deserialize, Serialize};

use crate::flatten::{message, Field, FieldValue, FlatValue, Record};

// ---------------------------------------------------------------------------
// Closed enumerations
// ---------------------------------------------------------------------------

/// Product vendor of the event source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vendor {
    Cisco,
    PaloAlto,
    Fortinet,
    CheckPoint,
    Microsoft,
    Kaspersky,
    CrowdStrike,
    // Catch-all kept last; serde requires `other` on the final variant.
    #[default]
    #[serde(other)]
    UnknownVendor,
}

impl Vendor {
    /// Symbolic wire name of the member.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::UnknownVendor => "UNKNOWN_VENDOR",
            Vendor::Cisco => "CISCO",
            Vendor::PaloAlto => "PALO_ALTO",
            Vendor::Fortinet => "FORTINET",
            Vendor::CheckPoint => "CHECK_POINT",
            Vendor::Microsoft => "MICROSOFT",
            Vendor::Kaspersky => "KASPERSKY",
            Vendor::CrowdStrike => "CROWD_STRIKE",
        }
    }
}

/// Source category of the event; its symbolic name doubles as the alert type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCategory {
    Firewall,
    Ids,
    Antivirus,
    Proxy,
    OperatingSystem,
    Application,
    Database,
    NetworkDevice,
    #[default]
    #[serde(other)]
    UnknownCategory,
}

impl SourceCategory {
    pub fn name(self) -> &'static str {
        match self {
            SourceCategory::UnknownCategory => "UNKNOWN_CATEGORY",
            SourceCategory::Firewall => "FIREWALL",
            SourceCategory::Ids => "IDS",
            SourceCategory::Antivirus => "ANTIVIRUS",
            SourceCategory::Proxy => "PROXY",
            SourceCategory::OperatingSystem => "OPERATING_SYSTEM",
            SourceCategory::Application => "APPLICATION",
            SourceCategory::Database => "DATABASE",
            SourceCategory::NetworkDevice => "NETWORK_DEVICE",
        }
    }
}

/// Interaction importance. The numeric level feeds the severity mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importance {
    Info,
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Importance {
    pub fn name(self) -> &'static str {
        match self {
            Importance::Unknown => "UNKNOWN",
            Importance::Info => "INFO",
            Importance::Low => "LOW",
            Importance::Medium => "MEDIUM",
            Importance::High => "HIGH",
            Importance::Critical => "CRITICAL",
        }
    }

    /// Numeric wire level: UNKNOWN = 0 up to CRITICAL = 5.
    pub fn level(self) -> i32 {
        match self {
            Importance::Unknown => 0,
            Importance::Info => 1,
            Importance::Low => 2,
            Importance::Medium => 3,
            Importance::High => 4,
            Importance::Critical => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Descriptor of the product that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventSource {
    pub id: String,
    pub vendor: Vendor,
    pub title: String,
    /// Wrapper type upstream: unset is distinct from empty.
    pub subsys: Option<String>,
    pub category: SourceCategory,
}

impl Record for EventSource {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field {
                name: "id",
                value: FieldValue::Scalar(FlatValue::Text(self.id.clone())),
            },
            Field {
                name: "vendor",
                value: FieldValue::Enum(self.vendor.name()),
            },
            Field {
                name: "title",
                value: FieldValue::Scalar(FlatValue::Text(self.title.clone())),
            },
            Field {
                name: "subsys",
                value: FieldValue::Wrapper(self.subsys.clone().map(FlatValue::Text)),
            },
            Field {
                name: "category",
                value: FieldValue::Enum(self.category.name()),
            },
        ]
    }
}

/// How important the observed interaction is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Interaction {
    pub importance: Importance,
}

impl Record for Interaction {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field {
            name: "importance",
            value: FieldValue::Enum(self.importance.name()),
        }]
    }
}

/// Collector that shipped the event into the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Collector {
    pub organization: String,
    pub hostname: String,
}

impl Record for Collector {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field {
                name: "organization",
                value: FieldValue::Scalar(FlatValue::Text(self.organization.clone())),
            },
            Field {
                name: "hostname",
                value: FieldValue::Scalar(FlatValue::Text(self.hostname.clone())),
            },
        ]
    }
}

/// Links from a normalized event back to its raw payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventData {
    pub raw_ids: Vec<String>,
}

impl Record for EventData {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field {
            name: "rawIds",
            value: FieldValue::ScalarList(
                self.raw_ids.iter().cloned().map(FlatValue::Text).collect(),
            ),
        }]
    }
}

/// Correlation output: rule name plus the ids of the correlated events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Correlation {
    pub name: String,
    /// Wrapper-string list upstream.
    pub event_ids: Vec<String>,
}

impl Record for Correlation {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field {
                name: "name",
                value: FieldValue::Scalar(FlatValue::Text(self.name.clone())),
            },
            Field {
                name: "eventIds",
                value: FieldValue::WrapperList(
                    self.event_ids
                        .iter()
                        .cloned()
                        .map(FlatValue::Text)
                        .collect(),
                ),
            },
        ]
    }
}

/// One structured, schema-validated security event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    /// Unix seconds.
    pub event_time: i64,
    pub event_source: EventSource,
    pub interaction: Interaction,
    pub collector: Collector,
    pub data: EventData,
    pub correlation: Correlation,
}

impl Record for NormalizedEvent {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field {
                name: "id",
                value: FieldValue::Scalar(FlatValue::Text(self.id.clone())),
            },
            Field {
                name: "eventTime",
                value: FieldValue::Scalar(FlatValue::Int(self.event_time)),
            },
            Field {
                name: "eventSource",
                value: message(&self.event_source),
            },
            Field {
                name: "interaction",
                value: message(&self.interaction),
            },
            Field {
                name: "collector",
                value: message(&self.collector),
            },
            Field {
                name: "data",
                value: message(&self.data),
            },
            Field {
                name: "correlation",
                value: message(&self.correlation),
            },
        ]
    }
}

/// Opaque original log payload backing a normalized event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,
    pub raw: String,
}
