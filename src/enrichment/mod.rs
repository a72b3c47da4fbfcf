pub mod adapters;
pub mod contact;
pub mod eligibility;
pub mod pipeline;
pub mod report;
pub mod status;
pub mod writer;

pub use adapters::{EnrichmentService, RecordStore};
pub use contact::Contact;
pub use pipeline::{Phase, ReconciliationDriver};
pub use report::RunReport;
pub use status::EnrichmentStatus;
