//! The seam between route handlers and the backing store.
//!
//! [`AirtableClient`](super::airtable::AirtableClient) is the production
//! implementation; tests plug in an in-memory fake.

use async_trait::async_trait;

use super::record::{DeletedRecord, Fields, ListQuery, Record, WriteRecord};
use crate::error::ProxyResult;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record by ID. `Ok(None)` when the store has no such record.
    async fn get(&self, table: &str, record_id: &str) -> ProxyResult<Option<Record>>;

    /// List records, following pagination until exhausted or `max_records` is hit.
    async fn list(&self, table: &str, query: ListQuery) -> ProxyResult<Vec<Record>>;

    /// First record matching `formula`, if any.
    async fn first(&self, table: &str, formula: Option<String>) -> ProxyResult<Option<Record>> {
        let records = self
            .list(table, ListQuery::filtered(formula).max_records(1))
            .await?;
        Ok(records.into_iter().next())
    }

    async fn create(&self, table: &str, fields: Fields, typecast: bool) -> ProxyResult<Record>;

    /// Partial update: only the given fields are touched.
    async fn update(
        &self,
        table: &str,
        record_id: &str,
        fields: Fields,
        typecast: bool,
    ) -> ProxyResult<Record>;

    async fn delete(&self, table: &str, record_id: &str) -> ProxyResult<DeletedRecord>;

    /// Create-or-update matched on `key_fields`. Conflict handling is the store's.
    async fn batch_upsert(
        &self,
        table: &str,
        records: Vec<WriteRecord>,
        key_fields: Vec<String>,
        typecast: bool,
    ) -> ProxyResult<Vec<Record>>;
}
