use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    attio::types::{fields, FieldUpdates, COMPANIES},
    clay::types::EnrichmentResult,
    enrichment::{adapters::RecordStore, contact::Contact, status::EnrichmentStatus},
    error::{PipelineError, Result},
    utils::truncate_chars,
};

/// Longest error message stored alongside a `failed` status
pub const MAX_ERROR_LEN: usize = 500;

/// A status change together with the fields it writes
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Sent {
        at: DateTime<Utc>,
        row_id: Option<String>,
    },
    Enriched {
        at: DateTime<Utc>,
        result: EnrichmentResult,
    },
    Failed {
        reason: String,
    },
    CompanyLinked {
        company_id: String,
    },
}

impl Transition {
    pub fn target(&self) -> EnrichmentStatus {
        match self {
            Transition::Sent { .. } => EnrichmentStatus::SentToClay,
            Transition::Enriched { .. } => EnrichmentStatus::Enriched,
            Transition::Failed { .. } => EnrichmentStatus::Failed,
            Transition::CompanyLinked { .. } => EnrichmentStatus::CompanyLinked,
        }
    }

    /// Fields written by this transition. Every write is an overwrite of a
    /// fixed set of attributes, so applying it twice changes nothing.
    pub fn updates(&self) -> FieldUpdates {
        let updates = FieldUpdates::new().with_text(fields::STATUS, Some(self.target().as_str()));

        match self {
            Transition::Sent { at, row_id } => updates
                .with_timestamp(fields::SENT_AT, *at)
                .with_text(fields::ROW_ID, row_id.as_deref()),
            Transition::Enriched { at, result } => updates
                .with_timestamp(fields::ENRICHED_AT, *at)
                .with_text(fields::JOB_TITLE, result.job_title.as_deref())
                .with_text(fields::LINKEDIN, result.linkedin_url.as_deref())
                .with_text(fields::PHONE, result.phone.as_deref())
                .with_text(fields::ENRICHED_COMPANY_NAME, result.company_name.as_deref())
                .with_text(fields::ROW_ID, result.row_id.as_deref()),
            Transition::Failed { reason } => {
                let reason = truncate_chars(reason, MAX_ERROR_LEN);
                updates.with_text(fields::ERROR, Some(&reason))
            }
            Transition::CompanyLinked { company_id } => {
                updates.with_reference(fields::COMPANY, COMPANIES, company_id)
            }
        }
    }
}

/// Applies guarded status transitions to the record store
pub struct StatusWriter<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> StatusWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Check `transition` against the contact's observed status and write it.
    /// Returns the new status; on error the record is assumed unchanged.
    pub async fn apply(&self, contact: &Contact, transition: &Transition) -> Result<EnrichmentStatus> {
        let target = check(contact, transition)?;

        self.store
            .patch(&contact.record_id, &transition.updates())
            .await?;

        debug!("{}: {} -> {}", contact.record_id, contact.status, target);
        Ok(target)
    }
}

/// Validate a transition without writing it
pub fn check(contact: &Contact, transition: &Transition) -> Result<EnrichmentStatus> {
    let target = transition.target();

    if !contact.status.can_transition_to(&target) {
        return Err(PipelineError::IllegalTransition {
            record_id: contact.record_id.clone(),
            from: contact.status.clone(),
            to: target,
        });
    }

    // The first successful link is final
    if matches!(transition, Transition::CompanyLinked { .. }) {
        if let Some(existing) = &contact.company_ref {
            return Err(PipelineError::NotEligible(format!(
                "{} already references company {}",
                contact.record_id, existing
            )));
        }
    }

    Ok(target)
}
