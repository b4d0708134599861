//! Shared helpers for integration tests: an in-memory `RecordStore` that
//! understands the handful of formula shapes the proxy emits, plus router
//! plumbing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

use airtable_proxy::config::Config;
use airtable_proxy::services::{
    DeletedRecord, Fields, ListQuery, Record, RecordStore, WriteRecord,
};
use airtable_proxy::{AppState, ProxyError, ProxyResult, build_app};

/// One call made against the fake, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get { table: String, id: String },
    List { table: String, formula: Option<String>, max_records: Option<usize> },
    Create { table: String, typecast: bool },
    Update { table: String, id: String, typecast: bool },
    Delete { table: String, id: String },
    Upsert {
        table: String,
        count: usize,
        key_fields: Vec<String>,
        typecast: bool,
    },
}

#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<(u16, JsonValue)>>,
    next_id: Mutex<u32>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a record with a fixed ID
    pub fn insert(&self, table: &str, id: &str, fields: JsonValue) -> Record {
        let record = Record {
            id: id.to_string(),
            created_time: "2024-05-01T10:00:00.000Z".to_string(),
            fields: object(fields),
        };
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    /// Every call from now on fails with this upstream status and body
    pub fn fail_with(&self, status: u16, body: JsonValue) {
        *self.failure.lock() = Some((status, body));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    fn record_call(&self, call: Call) -> ProxyResult<()> {
        self.calls.lock().push(call);
        match self.failure.lock().as_ref() {
            Some((status, body)) => Err(upstream(*status, body.clone())),
            None => Ok(()),
        }
    }

    fn new_record(&self, fields: Fields) -> Record {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let mut fields = fields;
        // Airtable tends to add computed fields; mimic one
        fields.insert("Autonumber".to_string(), json!(*next_id));
        Record {
            id: format!("rec{}", &uuid::Uuid::new_v4().simple().to_string()[..14]),
            created_time: chrono::Utc::now().to_rfc3339(),
            fields,
        }
    }
}

fn upstream(status: u16, body: JsonValue) -> ProxyError {
    let message = body["error"]["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .unwrap_or("request failed")
        .to_string();
    ProxyError::Upstream {
        status: Some(status),
        message,
        body: Some(body),
    }
}

fn not_found() -> ProxyError {
    upstream(404, json!({"error": "NOT_FOUND"}))
}

pub fn object(value: JsonValue) -> Fields {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn get(&self, table: &str, record_id: &str) -> ProxyResult<Option<Record>> {
        self.record_call(Call::Get {
            table: table.to_string(),
            id: record_id.to_string(),
        })?;
        Ok(self
            .records(table)
            .into_iter()
            .find(|r| r.id == record_id))
    }

    async fn list(&self, table: &str, query: ListQuery) -> ProxyResult<Vec<Record>> {
        self.record_call(Call::List {
            table: table.to_string(),
            formula: query.formula.clone(),
            max_records: query.max_records,
        })?;
        let mut records: Vec<Record> = self
            .records(table)
            .into_iter()
            .filter(|r| query.formula.as_deref().is_none_or(|f| matches_formula(f, r)))
            .collect();
        if let Some(max) = query.max_records {
            records.truncate(max);
        }
        Ok(records)
    }

    async fn create(&self, table: &str, fields: Fields, typecast: bool) -> ProxyResult<Record> {
        self.record_call(Call::Create {
            table: table.to_string(),
            typecast,
        })?;
        let record = self.new_record(fields);
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        record_id: &str,
        fields: Fields,
        typecast: bool,
    ) -> ProxyResult<Record> {
        self.record_call(Call::Update {
            table: table.to_string(),
            id: record_id.to_string(),
            typecast,
        })?;
        let mut tables = self.tables.lock();
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(not_found)?;
        record.fields.extend(fields);
        Ok(record.clone())
    }

    async fn delete(&self, table: &str, record_id: &str) -> ProxyResult<DeletedRecord> {
        self.record_call(Call::Delete {
            table: table.to_string(),
            id: record_id.to_string(),
        })?;
        let mut tables = self.tables.lock();
        let rows = tables.get_mut(table).ok_or_else(not_found)?;
        let position = rows
            .iter()
            .position(|r| r.id == record_id)
            .ok_or_else(not_found)?;
        rows.remove(position);
        Ok(DeletedRecord {
            id: record_id.to_string(),
            deleted: true,
        })
    }

    async fn batch_upsert(
        &self,
        table: &str,
        records: Vec<WriteRecord>,
        key_fields: Vec<String>,
        typecast: bool,
    ) -> ProxyResult<Vec<Record>> {
        self.record_call(Call::Upsert {
            table: table.to_string(),
            count: records.len(),
            key_fields: key_fields.clone(),
            typecast,
        })?;

        let mut upserted = Vec::new();
        for write in records {
            let existing = {
                let tables = self.tables.lock();
                tables.get(table).and_then(|rows| {
                    rows.iter()
                        .find(|r| match &write.id {
                            Some(id) => &r.id == id,
                            None => key_fields
                                .iter()
                                .all(|k| r.fields.get(k) == write.fields.get(k)),
                        })
                        .map(|r| r.id.clone())
                })
            };

            let record = match existing {
                Some(id) => {
                    let mut tables = self.tables.lock();
                    let row = tables
                        .get_mut(table)
                        .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
                        .ok_or_else(not_found)?;
                    row.fields.extend(write.fields);
                    row.clone()
                }
                None => {
                    let record = self.new_record(write.fields);
                    self.tables
                        .lock()
                        .entry(table.to_string())
                        .or_default()
                        .push(record.clone());
                    record
                }
            };
            upserted.push(record);
        }
        Ok(upserted)
    }
}

/// Evaluate the formula shapes the proxy produces against one record
pub fn matches_formula(formula: &str, record: &Record) -> bool {
    let record_id = Regex::new(r"RECORD_ID\(\)='([^']*)'").unwrap();
    if formula.starts_with("OR(RECORD_ID()") {
        return record_id
            .captures_iter(formula)
            .any(|c| c[1] == record.id);
    }

    let inner = formula
        .strip_prefix("AND(")
        .and_then(|f| f.strip_suffix(')'))
        .unwrap_or(formula);
    split_terms(inner)
        .iter()
        .all(|term| matches_term(term, &record.fields))
}

fn matches_term(term: &str, fields: &Fields) -> bool {
    let string_eq = Regex::new(r"^\{([^}]*)\} = '(.*)'$").unwrap();
    let number_eq = Regex::new(r"^\{([^}]*)\} = (-?[0-9.]+)$").unwrap();
    let negated = Regex::new(r"^NOT\(\{([^}]*)\}\)$").unwrap();
    let truthy = Regex::new(r"^\{([^}]*)\}$").unwrap();

    if let Some(c) = string_eq.captures(term) {
        let expected = c[2].replace("\\'", "'");
        return fields.get(&c[1]).and_then(JsonValue::as_str) == Some(expected.as_str());
    }
    if let Some(c) = number_eq.captures(term) {
        let expected: f64 = c[2].parse().unwrap();
        return fields.get(&c[1]).and_then(JsonValue::as_f64) == Some(expected);
    }
    if let Some(c) = negated.captures(term) {
        return !is_truthy(fields.get(&c[1]));
    }
    if let Some(c) = truthy.captures(term) {
        return is_truthy(fields.get(&c[1]));
    }
    panic!("fake store cannot evaluate formula term: {term}");
}

fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => false,
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

/// Split on top-level `, ` outside quoted strings
fn split_terms(formula: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut escaped = false;
    let mut chars = formula.chars().peekable();

    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' if in_quote => {
                escaped = true;
                current.push(c);
            }
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote && chars.peek() == Some(&' ') => {
                chars.next();
                terms.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "AIRTABLE_API_KEY" => Some("pat-test".to_string()),
        "AIRTABLE_BASE_ID" => Some("appTEST".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn app_with(store: Arc<FakeStore>) -> Router {
    build_app(AppState::new(Arc::new(test_config()), store))
}

/// Send one request through the router and decode the JSON answer
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
