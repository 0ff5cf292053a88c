//! Typed custom fields for TheHive cases and alerts.
//!
//! Converts a flattened path -> scalar map into the classic TheHive
//! custom-field shape: `{ "<name>": { "<type>": value, "order": n } }`.
//! Insertion order is preserved because `order` drives display ordering.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::json;

use crate::flatten::{FlatMap, FlatValue};

/// A single typed custom-field value.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomFieldValue {
    Date(i64),
    Number(i64),
    Boolean(bool),
    String(String),
}

impl CustomFieldValue {
    fn type_key(&self) -> &'static str {
        match self {
            CustomFieldValue::Date(_) => "date",
            CustomFieldValue::Number(_) => "number",
            CustomFieldValue::Boolean(_) => "boolean",
            CustomFieldValue::String(_) => "string",
        }
    }

    fn as_json(&self) -> serde_json::Value {
        match self {
            CustomFieldValue::Date(v) => json!(v),
            CustomFieldValue::Number(v) => json!(v),
            CustomFieldValue::Boolean(v) => json!(v),
            CustomFieldValue::String(v) => json!(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomField {
    pub name: String,
    pub value: CustomFieldValue,
}

/// Ordered set of custom fields attached to a case or alert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomFieldSet {
    fields: Vec<CustomField>,
}

impl CustomFieldSet {
    pub fn push(&mut self, name: &str, value: CustomFieldValue) {
        self.fields.push(CustomField {
            name: name.to_string(),
            value,
        });
    }

    /// Append a string field at the end of the set.
    pub fn add_string(&mut self, name: &str, value: String) {
        self.push(name, CustomFieldValue::String(value));
    }

    pub fn get(&self, name: &str) -> Option<&CustomFieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomField> {
        self.fields.iter()
    }
}

impl Serialize for CustomFieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (order, field) in self.fields.iter().enumerate() {
            let entry = json!({
                field.value.type_key(): field.value.as_json(),
                "order": order,
            });
            map.serialize_entry(&field.name, &entry)?;
        }
        map.end()
    }
}

/// Classify every flattened entry into a typed custom field.
///
/// Rules are checked in order:
/// 1. Key mentions "time" or "date" and the value is integral: a
///    Unix-seconds timestamp, stored as a date field in milliseconds.
/// 2. Date-time value: number field, epoch milliseconds.
/// 3. Boolean: boolean field. Checked before the integral rule since
///    booleans are integral in the source type system.
/// 4. Integral: number field.
/// 5. Text: string field.
/// 6. Anything else: best-effort string coercion, dropped on failure.
pub fn build_custom_fields(flat: &FlatMap) -> CustomFieldSet {
    let mut set = CustomFieldSet::default();
    for (key, value) in flat.iter() {
        let lower = key.to_ascii_lowercase();
        let timestamp_key = lower.contains("time") || lower.contains("date");
        let coerced = match value {
            FlatValue::Int(v) if timestamp_key => Some(CustomFieldValue::Date(v * 1000)),
            FlatValue::UInt(v) if timestamp_key => i64::try_from(*v)
                .ok()
                .map(|n| CustomFieldValue::Date(n * 1000)),
            FlatValue::Time(dt) => Some(CustomFieldValue::Number(dt.timestamp() * 1000)),
            FlatValue::Bool(v) => Some(CustomFieldValue::Boolean(*v)),
            FlatValue::Int(v) => Some(CustomFieldValue::Number(*v)),
            FlatValue::UInt(v) => match i64::try_from(*v) {
                Ok(n) => Some(CustomFieldValue::Number(n)),
                Err(_) => Some(CustomFieldValue::String(v.to_string())),
            },
            FlatValue::Text(v) => Some(CustomFieldValue::String(v.clone())),
            FlatValue::Float(v) => Some(CustomFieldValue::String(v.to_string())),
        };
        if let Some(value) = coerced {
            set.push(key, value);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn flat(entries: Vec<(&str, FlatValue)>) -> FlatMap {
        let mut map = FlatMap::default();
        for (k, v) in entries {
            map.insert(k.to_string(), v);
        }
        map
    }

    #[test]
    fn test_time_named_integral_becomes_date_in_millis() {
        let set = build_custom_fields(&flat(vec![("eventTime", FlatValue::Int(1000))]));
        assert_eq!(set.get("eventTime"), Some(&CustomFieldValue::Date(1_000_000)));
    }

    #[test]
    fn test_date_named_key_also_matches() {
        let set = build_custom_fields(&flat(vec![("detectedDate", FlatValue::Int(42))]));
        assert_eq!(set.get("detectedDate"), Some(&CustomFieldValue::Date(42_000)));
    }

    #[test]
    fn test_boolean_wins_over_integral() {
        let set = build_custom_fields(&flat(vec![("active", FlatValue::Bool(true))]));
        assert_eq!(set.get("active"), Some(&CustomFieldValue::Boolean(true)));
    }

    #[test]
    fn test_plain_integral_becomes_number() {
        let set = build_custom_fields(&flat(vec![("count", FlatValue::Int(5))]));
        assert_eq!(set.get("count"), Some(&CustomFieldValue::Number(5)));
    }

    #[test]
    fn test_datetime_value_becomes_number_in_epoch_millis() {
        let dt = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let set = build_custom_fields(&flat(vec![("seen", FlatValue::Time(dt))]));
        assert_eq!(
            set.get("seen"),
            Some(&CustomFieldValue::Number(dt.timestamp() * 1000))
        );
    }

    #[test]
    fn test_float_falls_back_to_string() {
        let set = build_custom_fields(&flat(vec![("score", FlatValue::Float(1.5))]));
        assert_eq!(
            set.get("score"),
            Some(&CustomFieldValue::String("1.5".into()))
        );
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let set = build_custom_fields(&flat(vec![
            ("b", FlatValue::Int(1)),
            ("a", FlatValue::Int(2)),
            ("c", FlatValue::Int(3)),
        ]));
        let names: Vec<&str> = set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_serialized_shape_carries_type_and_order() {
        let mut set = CustomFieldSet::default();
        set.push("first", CustomFieldValue::Date(1000));
        set.add_string("second", "x".into());
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["first"]["date"], 1000);
        assert_eq!(value["first"]["order"], 0);
        assert_eq!(value["second"]["string"], "x");
        assert_eq!(value["second"]["order"], 1);
    }
}
