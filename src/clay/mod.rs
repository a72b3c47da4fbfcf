pub mod client;
pub mod types;

pub use client::ClayClient;
pub use types::{EnrichmentResult, ResultLookup, SubmissionPayload};
