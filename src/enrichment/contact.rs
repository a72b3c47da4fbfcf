use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::attio::{
    types::{fields, Record},
    values::{extract_field, extract_name_parts, extract_timestamp},
};
use crate::clay::types::{ResultLookup, SubmissionPayload};
use crate::enrichment::status::EnrichmentStatus;

/// A people record with every field the state machine reads already normalized
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contact {
    pub record_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    /// Target id of the `company` record reference
    pub company_ref: Option<String>,
    pub linkedin: Option<String>,
    pub status: EnrichmentStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub enriched_company_name: Option<String>,
    pub clay_row_id: Option<String>,
}

impl Contact {
    pub fn from_record(record: &Record) -> Self {
        let (first_name, last_name) = extract_name_parts(record, fields::NAME);

        Self {
            record_id: record.record_id().to_string(),
            email: extract_field(record, fields::EMAIL),
            first_name,
            last_name,
            job_title: extract_field(record, fields::JOB_TITLE),
            company_ref: extract_field(record, fields::COMPANY),
            linkedin: extract_field(record, fields::LINKEDIN),
            status: EnrichmentStatus::parse(extract_field(record, fields::STATUS).as_deref()),
            sent_at: extract_timestamp(record, fields::SENT_AT),
            enriched_company_name: extract_field(record, fields::ENRICHED_COMPANY_NAME),
            clay_row_id: extract_field(record, fields::ROW_ID),
        }
    }

    /// Row sent to Clay; `None` without an email to enrich from
    pub fn submission_payload(&self) -> Option<SubmissionPayload> {
        Some(SubmissionPayload {
            attio_record_id: self.record_id.clone(),
            email: self.email.clone()?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        })
    }

    pub fn result_lookup(&self) -> ResultLookup {
        ResultLookup {
            record_id: self.record_id.clone(),
            row_id: self.clay_row_id.clone(),
        }
    }
}

impl From<&Record> for Contact {
    fn from(record: &Record) -> Self {
        Contact::from_record(record)
    }
}
