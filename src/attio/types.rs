use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::attio::values::extract_field;

/// Attribute slugs on the Attio `people` object.
pub mod fields {
    pub const EMAIL: &str = "email_addresses";
    pub const NAME: &str = "name";
    pub const JOB_TITLE: &str = "job_title";
    pub const COMPANY: &str = "company";
    pub const LINKEDIN: &str = "linkedin";
    pub const PHONE: &str = "enriched_phone";
    pub const STATUS: &str = "clay_enrichment_status";
    pub const SENT_AT: &str = "clay_sent_at";
    pub const ENRICHED_AT: &str = "clay_enriched_at";
    pub const ROW_ID: &str = "clay_row_id";
    pub const ENRICHED_COMPANY_NAME: &str = "enriched_company_name";
    pub const ERROR: &str = "enrichment_error";
    pub const CREATED_AT: &str = "created_at";
}

pub const PEOPLE: &str = "people";
pub const COMPANIES: &str = "companies";

/// A record as returned by the Attio records API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordIdentity,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Raw attribute values keyed by slug; shapes vary per attribute type
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordIdentity {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    pub record_id: String,
}

impl Record {
    pub fn record_id(&self) -> &str {
        &self.id.record_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: Option<String>,
}

impl Company {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.record_id().to_string(),
            name: extract_field(record, fields::NAME),
        }
    }
}

/// A single logical value to be written to an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    Reference {
        target_object: String,
        target_record_id: String,
    },
}

impl FieldValue {
    /// Attio write format for this value
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Timestamp(at) => {
                Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            FieldValue::Reference {
                target_object,
                target_record_id,
            } => json!([{
                "target_object": target_object,
                "target_record_id": target_record_id,
            }]),
        }
    }
}

/// Field → value mapping for one patch. Absent values are kept here so callers
/// can pass optional data straight through; they are dropped on serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates(BTreeMap<String, Option<FieldValue>>);

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: Option<FieldValue>) -> Self {
        self.0.insert(field.to_string(), value);
        self
    }

    pub fn with_text(self, field: &str, value: Option<&str>) -> Self {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| FieldValue::Text(v.to_string()));
        self.with(field, value)
    }

    pub fn with_timestamp(self, field: &str, at: DateTime<Utc>) -> Self {
        self.with(field, Some(FieldValue::Timestamp(at)))
    }

    pub fn with_reference(self, field: &str, target_object: &str, target_record_id: &str) -> Self {
        self.with(
            field,
            Some(FieldValue::Reference {
                target_object: target_object.to_string(),
                target_record_id: target_record_id.to_string(),
            }),
        )
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field).and_then(Option::as_ref)
    }

    /// Fields that carry a value, in slug order
    pub fn present(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0
            .iter()
            .filter_map(|(field, value)| value.as_ref().map(|v| (field.as_str(), v)))
    }

    pub fn to_attio_values(&self) -> Map<String, Value> {
        self.present()
            .map(|(field, value)| (field.to_string(), value.to_json()))
            .collect()
    }
}

/// Which slice of people records a query is after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    /// `sent_to_clay`, oldest submission first
    AwaitingResults,
    /// `enriched`, waiting for a company reference
    AwaitingCompanyLink,
    /// Most recently created contacts; filtered client-side
    Candidates,
}
