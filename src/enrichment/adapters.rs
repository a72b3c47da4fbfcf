//! Contracts the reconciliation driver needs from its two collaborators.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{
    attio::types::{Company, FieldUpdates, Record, StatusQuery},
    clay::types::{EnrichmentResult, ResultLookup, SubmissionPayload},
    error::Result,
};

/// The CRM holding people and company records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `query`; ordering is a hint, not a guarantee.
    async fn query_by_status(&self, query: StatusQuery, limit: usize) -> Result<Vec<Record>>;

    /// Overwrite the given fields on one record. Absent values are not written.
    async fn patch(&self, record_id: &str, updates: &FieldUpdates) -> Result<()>;

    async fn find_companies(&self, name: &str) -> Result<Vec<Company>>;

    async fn create_company(&self, name: &str) -> Result<Company>;
}

/// The asynchronous enrichment service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Submit one record, returning the service's correlation token if it gave one.
    async fn submit(&self, payload: &SubmissionPayload) -> Result<Option<String>>;

    /// Finished results keyed by record id. Records still in progress are absent.
    async fn fetch_results(
        &self,
        lookups: &[ResultLookup],
    ) -> Result<HashMap<String, EnrichmentResult>>;
}
