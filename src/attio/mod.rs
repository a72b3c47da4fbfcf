pub mod client;
pub mod types;
pub mod values;

pub use client::AttioClient;
pub use types::{Company, FieldUpdates, FieldValue, Record, StatusQuery};
