//! Domain records: incidents, normalized events, raw events.
//!
//! Field names and enum members mirror the correlator's wire schema
//! (camelCase keys, SCREAMING_SNAKE enum names). Deserialization is
//! lenient: unknown keys are ignored and missing keys take defaults, so
//! schema additions upstream never reject a message.

pub mod event;
pub mod incident;

pub use event::{
    Collector, Correlation, EventData, EventSource, Importance, Interaction, NormalizedEvent,
    RawEvent, SourceCategory, Vendor,
};
pub use incident::{Incident, SeverityLevel};
