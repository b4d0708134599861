//! Backing-store integration and the logic layered on top of it

pub mod airtable;
pub mod formula;
pub mod orders;
pub mod rate_limiter;
pub mod record;
pub mod store;

pub use airtable::AirtableClient;
pub use orders::{OrderView, denormalize};
pub use record::{DeletedRecord, Fields, ListQuery, Record, WriteRecord};
pub use store::RecordStore;
