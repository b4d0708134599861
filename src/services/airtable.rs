//! Airtable REST API client
//!
//! Base URL: https://api.airtable.com/v0/{baseId}/{tableIdOrName}
//!
//! Rate limiting: Airtable allows 5 requests per second per base. This
//! client waits for a permit before each call and retries 429 answers.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use url::Url;

use super::rate_limiter::{RateLimitConfig, RateLimitedClient, RetryConfig, is_rate_limited, retry_async};
use super::record::{DeletedRecord, Fields, ListQuery, Record, WriteRecord};
use super::store::RecordStore;
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};

/// Largest page Airtable serves for a list call
const MAX_PAGE_SIZE: usize = 100;

/// Records accepted per create/update/upsert request
const MAX_RECORDS_PER_WRITE: usize = 10;

/// Longest list URL sent as a GET; longer queries go through `POST .../listRecords`
const MAX_URL_LENGTH: usize = 16_000;

/// Airtable API client bound to one base
pub struct AirtableClient {
    http: RateLimitedClient,
    api_url: Url,
    base_id: String,
    api_key: String,
    retry_config: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

/// One page request of a list call, as query pairs or as a `listRecords` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_by_formula: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_records: Option<usize>,
    page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<&'a str>,
}

impl ListParams<'_> {
    fn apply_to(&self, url: &Url) -> Url {
        let mut url = url.clone();
        {
            let mut query = url.query_pairs_mut();
            if let Some(formula) = self.filter_by_formula {
                query.append_pair("filterByFormula", formula);
            }
            if let Some(max) = self.max_records {
                query.append_pair("maxRecords", &max.to_string());
            }
            query.append_pair("pageSize", &self.page_size.to_string());
            if let Some(offset) = self.offset {
                query.append_pair("offset", offset);
            }
        }
        url
    }
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    fields: &'a Fields,
    typecast: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    perform_upsert: PerformUpsert<'a>,
    records: &'a [WriteRecord],
    typecast: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerformUpsert<'a> {
    fields_to_merge_on: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(default)]
    records: Vec<Record>,
}

impl AirtableClient {
    /// Create a client from application configuration
    pub fn new(config: &Config) -> ProxyResult<Self> {
        Self::with_settings(
            &config.airtable_api_url,
            &config.airtable_base_id,
            &config.airtable_api_key,
            RateLimitConfig {
                requests_per_second: config.airtable_requests_per_second,
                burst_size: config.airtable_requests_per_second,
                timeout: config.airtable_timeout,
            },
            RetryConfig {
                max_retries: config.airtable_max_retries.max(1),
                ..RetryConfig::default()
            },
        )
    }

    pub fn with_settings(
        api_url: &str,
        base_id: &str,
        api_key: &str,
        rate_limit: RateLimitConfig,
        retry_config: RetryConfig,
    ) -> ProxyResult<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| ProxyError::Configuration(format!("invalid API URL '{api_url}': {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(ProxyError::Configuration(format!(
                "API URL '{api_url}' cannot carry a path"
            )));
        }

        Ok(Self {
            http: RateLimitedClient::new("airtable", rate_limit)?,
            api_url,
            base_id: base_id.to_string(),
            api_key: api_key.to_string(),
            retry_config,
        })
    }

    /// URL of a table, or of one record when `record_id` is given
    pub fn table_url(&self, table: &str, record_id: Option<&str>) -> ProxyResult<Url> {
        if table.trim().is_empty() {
            return Err(ProxyError::Configuration("table name must not be empty".to_string()));
        }

        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProxyError::Configuration(format!("API URL '{}' cannot carry a path", self.api_url))
            })?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Send a request built by `build`, retrying throttled attempts, and decode the JSON answer
    async fn execute<T, B>(&self, operation: &str, build: B) -> ProxyResult<T>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder,
    {
        let this = self;
        let build = &build;
        retry_async(
            move || async move {
                let request = build().bearer_auth(&this.api_key);
                let response = this.http.send(request).await?;
                decode(response).await
            },
            is_rate_limited,
            &self.retry_config,
            operation,
        )
        .await
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.inner().request(method, url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ProxyResult<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| ProxyError::Upstream {
            status: Some(status.as_u16()),
            message: format!("failed to parse Airtable response: {e}"),
            body: None,
        });
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<JsonValue>(&text).ok();
    let message = body
        .as_ref()
        .and_then(error_message)
        .or_else(|| (!text.trim().is_empty()).then(|| text.clone()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(ProxyError::Upstream {
        status: Some(status.as_u16()),
        message,
        body,
    })
}

/// Pull a human-readable message out of an Airtable error body.
///
/// Airtable answers either `{"error": {"type": ..., "message": ...}}` or
/// `{"error": "NOT_FOUND"}`.
fn error_message(body: &JsonValue) -> Option<String> {
    match body.get("error")? {
        JsonValue::String(kind) => Some(kind.clone()),
        JsonValue::Object(err) => err
            .get("message")
            .or_else(|| err.get("type"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn get(&self, table: &str, record_id: &str) -> ProxyResult<Option<Record>> {
        debug!(table = %table, record_id = %record_id, "Fetching Airtable record");

        let url = self.table_url(table, Some(record_id))?;
        match self
            .execute::<Record, _>("airtable_get", || self.request(Method::GET, url.clone()))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(ProxyError::Upstream {
                status: Some(404), ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, table: &str, query: ListQuery) -> ProxyResult<Vec<Record>> {
        debug!(
            table = %table,
            formula = query.formula.as_deref().unwrap_or(""),
            max_records = ?query.max_records,
            "Listing Airtable records"
        );

        let url = self.table_url(table, None)?;
        let post_url = self.table_url(table, Some("listRecords"))?;
        let mut records: Vec<Record> = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let remaining = query.max_records.map(|max| max.saturating_sub(records.len()));
            if remaining == Some(0) {
                break;
            }

            let params = ListParams {
                filter_by_formula: query.formula.as_deref(),
                max_records: query.max_records,
                page_size: remaining.map_or(MAX_PAGE_SIZE, |r| r.min(MAX_PAGE_SIZE)),
                offset: offset.as_deref(),
            };

            let get_url = params.apply_to(&url);
            let page: ListResponse = if get_url.as_str().len() > MAX_URL_LENGTH {
                debug!(table = %table, "List query too long for a URL, posting it instead");
                self.execute("airtable_list", || {
                    self.request(Method::POST, post_url.clone()).json(&params)
                })
                .await?
            } else {
                self.execute("airtable_list", || self.request(Method::GET, get_url.clone()))
                    .await?
            };

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        if let Some(max) = query.max_records {
            records.truncate(max);
        }

        debug!(table = %table, count = records.len(), "Airtable list returned records");
        Ok(records)
    }

    async fn create(&self, table: &str, fields: Fields, typecast: bool) -> ProxyResult<Record> {
        info!(table = %table, "Creating Airtable record");

        let url = self.table_url(table, None)?;
        let body = WriteRequest {
            fields: &fields,
            typecast,
        };
        self.execute("airtable_create", || {
            self.request(Method::POST, url.clone()).json(&body)
        })
        .await
    }

    async fn update(
        &self,
        table: &str,
        record_id: &str,
        fields: Fields,
        typecast: bool,
    ) -> ProxyResult<Record> {
        info!(table = %table, record_id = %record_id, "Updating Airtable record");

        let url = self.table_url(table, Some(record_id))?;
        let body = WriteRequest {
            fields: &fields,
            typecast,
        };
        self.execute("airtable_update", || {
            self.request(Method::PATCH, url.clone()).json(&body)
        })
        .await
    }

    async fn delete(&self, table: &str, record_id: &str) -> ProxyResult<DeletedRecord> {
        info!(table = %table, record_id = %record_id, "Deleting Airtable record");

        let url = self.table_url(table, Some(record_id))?;
        self.execute("airtable_delete", || self.request(Method::DELETE, url.clone()))
            .await
    }

    async fn batch_upsert(
        &self,
        table: &str,
        records: Vec<WriteRecord>,
        key_fields: Vec<String>,
        typecast: bool,
    ) -> ProxyResult<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            table = %table,
            count = records.len(),
            key_fields = ?key_fields,
            "Upserting Airtable records"
        );

        let url = self.table_url(table, None)?;
        let mut upserted = Vec::with_capacity(records.len());
        for chunk in records.chunks(MAX_RECORDS_PER_WRITE) {
            let body = UpsertRequest {
                perform_upsert: PerformUpsert {
                    fields_to_merge_on: &key_fields,
                },
                records: chunk,
                typecast,
            };
            let response: UpsertResponse = self
                .execute("airtable_upsert", || {
                    self.request(Method::PATCH, url.clone()).json(&body)
                })
                .await?;
            upserted.extend(response.records);
        }

        Ok(upserted)
    }
}
