//! Generic record endpoints for any table in the base

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use super::{ApiResponse, parse_body, parse_body_or_default};
use crate::AppState;
use crate::error::{ProxyError, ProxyResult};
use crate::services::{Fields, ListQuery, WriteRecord, formula};

/// Records returned by the plain list endpoint
const LIST_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct RecordBody {
    #[serde(default)]
    pub id: Option<String>,
    pub fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpsertBody {
    #[serde(default)]
    pub records: Vec<RecordBody>,
    pub key_fields: Vec<String>,
}

/// List the first records of a table
async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> ProxyResult<Json<ApiResponse>> {
    let records = state
        .store
        .list(&table, ListQuery::all().max_records(LIST_LIMIT))
        .await?;

    let count = records.len();
    Ok(Json(
        ApiResponse::success(format!("Fetched {count} records from {table}"), records)?
            .with_count(count),
    ))
}

/// Get a single record by ID
async fn get_record(
    State(state): State<AppState>,
    Path((table, record_id)): Path<(String, String)>,
) -> ProxyResult<Json<ApiResponse>> {
    let record = state
        .store
        .get(&table, &record_id)
        .await?
        .ok_or_else(|| ProxyError::not_found("Record not found"))?;

    Ok(Json(ApiResponse::success("Record fetched", record)?))
}

/// Create a record, letting Airtable coerce values to the field types
async fn create_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let body: RecordBody = parse_body(&body)?;
    let record = state.store.create(&table, body.fields, true).await?;

    Ok(Json(ApiResponse::success("Record created", record)?))
}

/// Partially update a record
async fn update_record(
    State(state): State<AppState>,
    Path((table, record_id)): Path<(String, String)>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let body: RecordBody = parse_body(&body)?;
    let record = state
        .store
        .update(&table, &record_id, body.fields, true)
        .await?;

    Ok(Json(ApiResponse::success("Record updated", record)?))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((table, record_id)): Path<(String, String)>,
) -> ProxyResult<Json<ApiResponse>> {
    let deleted = state.store.delete(&table, &record_id).await?;

    Ok(Json(ApiResponse::success(
        "Record deleted",
        json!({ "deleted_record_id": deleted.id }),
    )?))
}

/// First record matching every `{field: value}` pair in the body
async fn search_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let filters: Fields = parse_body(&body)?;
    let formula = formula::compile(&filters)?;

    let record = state
        .store
        .first(&table, formula)
        .await?
        .ok_or_else(|| ProxyError::not_found("Record not found"))?;

    Ok(Json(ApiResponse::success("Record found", record)?))
}

/// Every record matching the body's filters; no match is an empty success
async fn search_all_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let filters: Fields = parse_body(&body)?;
    let formula = formula::compile(&filters)?;

    let records = state.store.list(&table, ListQuery::filtered(formula)).await?;

    let count = records.len();
    Ok(Json(
        ApiResponse::success(format!("Found {count} matching records"), records)?
            .with_count(count),
    ))
}

/// Create-or-update records matched on `key_fields`.
/// Values are sent as-is; Airtable rejects type mismatches.
async fn upsert_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: Bytes,
) -> ProxyResult<Json<ApiResponse>> {
    let body: UpsertBody = parse_body_or_default(&body)?;

    let upserted = if body.records.is_empty() {
        Vec::new()
    } else {
        let records = body
            .records
            .into_iter()
            .map(|r| WriteRecord {
                id: r.id,
                fields: r.fields,
            })
            .collect();
        state
            .store
            .batch_upsert(&table, records, body.key_fields, false)
            .await?
    };

    let count = upserted.len();
    Ok(Json(
        ApiResponse::success(format!("Upserted {count} records."), upserted)?.with_count(count),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{table}/records", get(list_records).post(create_record))
        .route(
            "/{table}/records/{id}",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .route("/{table}/search", post(search_record))
        .route("/{table}/search-all", post(search_all_records))
        .route("/{table}/upsert", post(upsert_records))
}
