//! Generic record flattening.
//!
//! Turns an arbitrarily nested, self-describing record into a flat
//! path -> scalar map whose keys are camel-joined field paths, the shape
//! TheHive custom-field templates reference. Model types describe their own
//! schema through the [`Record`] trait, so the walk is written once and
//! works for any record that declares its fields.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// A scalar leaf value produced by flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl std::fmt::Display for FlatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatValue::Bool(v) => write!(f, "{}", v),
            FlatValue::Int(v) => write!(f, "{}", v),
            FlatValue::UInt(v) => write!(f, "{}", v),
            FlatValue::Float(v) => write!(f, "{}", v),
            FlatValue::Text(v) => write!(f, "{}", v),
            FlatValue::Time(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// The value of one declared field, as seen by the flattener.
///
/// `Wrapper` mirrors protobuf wrapper types: a message standing in for an
/// optional primitive, where `None` means unset (as opposed to zero).
pub enum FieldValue<'a> {
    Scalar(FlatValue),
    ScalarList(Vec<FlatValue>),
    Enum(&'static str),
    EnumList(Vec<&'static str>),
    Wrapper(Option<FlatValue>),
    WrapperList(Vec<FlatValue>),
    Message(Option<&'a dyn Record>),
    MessageList(Vec<&'a dyn Record>),
}

/// One field of a record: its declared name plus its current value.
pub struct Field<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
}

/// A self-describing record the flattener can walk.
pub trait Record {
    /// The record's fields in declaration order.
    fn fields(&self) -> Vec<Field<'_>>;
}

/// Descriptor for an optional nested message: a message equal to its default
/// is treated as unset and contributes no keys.
pub fn message<T: Record + Default + PartialEq>(value: &T) -> FieldValue<'_> {
    if *value == T::default() {
        FieldValue::Message(None)
    } else {
        FieldValue::Message(Some(value))
    }
}

// ---------------------------------------------------------------------------
// Flat map
// ---------------------------------------------------------------------------

/// Path -> scalar map preserving insertion order.
///
/// Order matters downstream: custom fields carry an `order` attribute that
/// controls display in TheHive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatMap {
    entries: Vec<(String, FlatValue)>,
}

impl FlatMap {
    pub fn insert(&mut self, key: String, value: FlatValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Flatten `record` into a path -> scalar map.
///
/// Rules, in precedence order:
/// 1. An unset optional message contributes no keys at all.
/// 2. A repeated wrapper field collapses to one `"; "`-joined entry.
/// 3. A repeated message field recurses per element with an `[i]` marker.
/// 4. A set wrapper field emits its unwrapped scalar at the field's path.
/// 5. Any other message field recurses with the path extended by its name.
/// 6. Enum fields emit the member's symbolic name, never its number.
/// 7. Scalars emit as-is; repeated scalars join with `"; "`.
pub fn flatten(record: &dyn Record) -> FlatMap {
    let mut path = Vec::new();
    let mut out = FlatMap::default();
    flatten_into(record, &mut path, &mut out);
    out
}

fn flatten_into(record: &dyn Record, path: &mut Vec<String>, out: &mut FlatMap) {
    for field in record.fields() {
        path.push(field.name.to_string());
        match field.value {
            // Unset optional message or wrapper: no key emitted.
            FieldValue::Message(None) | FieldValue::Wrapper(None) => {}
            FieldValue::Message(Some(inner)) => flatten_into(inner, path, out),
            FieldValue::MessageList(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    path.push(format!("[{}]", index));
                    flatten_into(item, path, out);
                    path.pop();
                }
            }
            FieldValue::Wrapper(Some(value)) => out.insert(full_path(path), value),
            FieldValue::WrapperList(values) => out.insert(full_path(path), joined(&values)),
            FieldValue::Enum(name) => {
                out.insert(full_path(path), FlatValue::Text(name.to_string()))
            }
            FieldValue::EnumList(names) => {
                out.insert(full_path(path), FlatValue::Text(names.join("; ")))
            }
            FieldValue::Scalar(value) => out.insert(full_path(path), value),
            FieldValue::ScalarList(values) => out.insert(full_path(path), joined(&values)),
        }
        path.pop();
    }
}

fn joined(values: &[FlatValue]) -> FlatValue {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    FlatValue::Text(parts.join("; "))
}

/// Camel-join the path stack: every segment is split on underscores, the
/// first sub-segment stays as-is, every later one is capitalized on its
/// first character, and all are concatenated with no separator.
fn full_path(stack: &[String]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for item in stack {
        segments.extend(item.split('_'));
    }
    let mut out = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index == 0 {
            out.push_str(segment);
        } else {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
