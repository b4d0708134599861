//! Airtable formula builders
//!
//! Turns flat `{field: value}` filter maps into `filterByFormula` predicates:
//! - `true` selects checked fields: `{Done}`
//! - `false` selects unchecked fields: `NOT({Done})`
//! - numbers compare unquoted: `{Qty} = 3`
//! - strings compare quoted, with `'` escaped: `{Name} = 'O\'Brien'`
//!
//! Several predicates are conjoined with `AND(...)` in input order.

use serde_json::Value as JsonValue;

use super::record::Fields;
use crate::error::{ProxyError, ProxyResult};

/// Compile a filter map into a single predicate.
///
/// Returns `Ok(None)` for an empty map, meaning "fetch unfiltered".
pub fn compile(filters: &Fields) -> ProxyResult<Option<String>> {
    let parts = filters
        .iter()
        .map(|(key, value)| predicate(key, value))
        .collect::<ProxyResult<Vec<_>>>()?;

    Ok(conjoin(parts))
}

fn predicate(key: &str, value: &JsonValue) -> ProxyResult<String> {
    match value {
        JsonValue::Bool(true) => Ok(field_ref(key)),
        JsonValue::Bool(false) => Ok(format!("NOT({})", field_ref(key))),
        JsonValue::Number(n) => Ok(format!("{} = {}", field_ref(key), n)),
        JsonValue::String(s) => Ok(field_equals(key, s)),
        other => Err(ProxyError::UnsupportedFilterType {
            key: key.to_string(),
            type_name: json_type_name(other),
        }),
    }
}

fn conjoin(mut parts: Vec<String>) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("AND({})", parts.join(", "))),
    }
}

fn field_ref(field: &str) -> String {
    format!("{{{field}}}")
}

/// Escape a value for use inside a single-quoted formula string.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// `{field} = 'value'`
pub fn field_equals(field: &str, value: &str) -> String {
    format!("{} = '{}'", field_ref(field), escape_string(value))
}

/// `OR(RECORD_ID()='id1', RECORD_ID()='id2', ...)`; `None` when `ids` is empty.
pub fn record_id_in<S: AsRef<str>>(ids: &[S]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let parts: Vec<String> = ids
        .iter()
        .map(|id| format!("RECORD_ID()='{}'", id.as_ref()))
        .collect();
    Some(format!("OR({})", parts.join(", ")))
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
