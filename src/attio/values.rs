//! Normalization of Attio attribute values.
//!
//! Attio returns every attribute as a list of typed entries whose shape
//! depends on the attribute type: `text` carries `value`, `personal-name`
//! carries `full_name`/`first_name`/`last_name`, `record-reference` carries
//! `target_record_id`, selects nest their title under `option`, and so on.
//! Older or hand-built payloads may also hold a bare scalar or a single
//! object. Everything here folds those shapes into one optional string and
//! never fails: anything unrecognised is treated as absent.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::attio::types::Record;

#[derive(Debug, Deserialize)]
struct Titled {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "attribute_type", rename_all = "kebab-case")]
enum AttributeValue {
    Text {
        value: Option<String>,
    },
    Number {
        value: Option<serde_json::Number>,
    },
    Timestamp {
        value: Option<String>,
    },
    Date {
        value: Option<String>,
    },
    PersonalName {
        full_name: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    EmailAddress {
        email_address: Option<String>,
        original_email_address: Option<String>,
    },
    PhoneNumber {
        phone_number: Option<String>,
        original_phone_number: Option<String>,
    },
    Domain {
        domain: Option<String>,
    },
    RecordReference {
        target_record_id: Option<String>,
    },
    Select {
        option: Option<Titled>,
    },
    Status {
        status: Option<Titled>,
    },
    #[serde(other)]
    Unsupported,
}

impl AttributeValue {
    fn into_text(self) -> Option<String> {
        match self {
            AttributeValue::Text { value }
            | AttributeValue::Timestamp { value }
            | AttributeValue::Date { value } => value,
            AttributeValue::Number { value } => value.map(|n| n.to_string()),
            AttributeValue::PersonalName {
                full_name,
                first_name,
                last_name,
            } => full_name.filter(|n| !n.trim().is_empty()).or_else(|| {
                let joined = [first_name, last_name]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(joined)
            }),
            AttributeValue::EmailAddress {
                email_address,
                original_email_address,
            } => email_address
                .filter(|e| !e.trim().is_empty())
                .or(original_email_address),
            AttributeValue::PhoneNumber {
                phone_number,
                original_phone_number,
            } => phone_number
                .filter(|p| !p.trim().is_empty())
                .or(original_phone_number),
            AttributeValue::Domain { domain } => domain,
            AttributeValue::RecordReference { target_record_id } => target_record_id,
            AttributeValue::Select { option } => option.and_then(|o| o.title),
            AttributeValue::Status { status } => status.and_then(|s| s.title),
            AttributeValue::Unsupported => None,
        }
    }
}

/// Untyped objects: keys tried in order
const FALLBACK_KEYS: [&str; 5] = [
    "value",
    "full_name",
    "email_address",
    "target_record_id",
    "title",
];

/// Extract the current logical value of `field`, or `None` if the attribute is
/// missing, empty or shaped in a way we don't understand.
pub fn extract_field(record: &Record, field: &str) -> Option<String> {
    record.values.get(field).and_then(decode_field)
}

/// Extract `field` and parse it as an RFC 3339 timestamp.
pub fn extract_timestamp(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    extract_field(record, field)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// First and last name from a `personal-name` attribute.
pub fn extract_name_parts(record: &Record, field: &str) -> (Option<String>, Option<String>) {
    let Some(raw) = record.values.get(field) else {
        return (None, None);
    };

    let name = current_entries(raw).find_map(|entry| {
        match serde_json::from_value::<AttributeValue>(entry.clone()) {
            Ok(AttributeValue::PersonalName {
                first_name,
                last_name,
                ..
            }) => Some((non_blank(first_name), non_blank(last_name))),
            _ => None,
        }
    });

    name.unwrap_or((None, None))
}

/// Decode one raw attribute payload.
pub fn decode_field(raw: &Value) -> Option<String> {
    current_entries(raw).find_map(decode_entry)
}

/// Entries still in effect. Attio keeps history entries with `active_until` set.
fn current_entries(raw: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match raw {
        Value::Array(entries) => Box::new(
            entries
                .iter()
                .filter(|e| e.get("active_until").map_or(true, Value::is_null)),
        ),
        Value::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

fn decode_entry(entry: &Value) -> Option<String> {
    let text = match entry {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) if map.contains_key("attribute_type") => {
            serde_json::from_value::<AttributeValue>(entry.clone())
                .ok()
                .and_then(AttributeValue::into_text)
        }
        Value::Object(map) => FALLBACK_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(scalar_text)),
        _ => None,
    };

    non_blank(text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
