//! Hosted-table backend speaking a NocoDB-style v2 records API.
//!
//! A collection is a table id. Items are records: the id comes from `Id`
//! (or `id`), the key from the configured sort field. Records whose key is
//! missing or not numeric sort at [`DEFAULT_KEY`](crate::ordering::DEFAULT_KEY).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::TaskorderToml;
use crate::ordering::key::key_or_default;
use crate::ordering::models::sort_items;
use crate::ordering::{OrderStore, OrderedItem};

/// Header carrying the API token.
const TOKEN_HEADER: &str = "xc-token";

/// Field names tried after the configured sort field.
const SORT_FIELD_ALIASES: &[&str] = &["SortOrder", "sortOrder"];

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    list: Vec<Map<String, Value>>,
    #[serde(rename = "pageInfo", default)]
    page_info: PageInfo,
}

#[derive(Debug, Default, Deserialize)]
struct PageInfo {
    #[serde(rename = "isLastPage")]
    is_last_page: Option<bool>,
}

/// Read the record id as a string. Numbers and strings are accepted.
fn record_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("Id").or_else(|| record.get("id"))? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let key = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    key.filter(|k| k.is_finite())
}

/// Sort key of a record, trying the configured field then known aliases.
fn record_key(record: &Map<String, Value>, sort_field: &str) -> f64 {
    let raw = std::iter::once(sort_field)
        .chain(SORT_FIELD_ALIASES.iter().copied())
        .find_map(|field| record.get(field).and_then(numeric));
    key_or_default(raw)
}

/// Ids that look like integers go back out as JSON numbers.
fn id_value(item_id: &str) -> Value {
    match item_id.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(item_id),
    }
}

pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    sort_field: String,
    page_size: usize,
}

impl RemoteStore {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        sort_field: &str,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskorder/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            sort_field: sort_field.to_string(),
            page_size: page_size.max(1),
        })
    }

    /// Build from the `[remote]` section plus environment overrides.
    pub fn from_config(config: &TaskorderToml) -> Result<Self> {
        let base_url = config.remote_url().context(
            "No remote configured: set [remote] base_url or TASKORDER_REMOTE_URL",
        )?;
        Self::new(
            &base_url,
            config.remote_token(),
            &config.remote.sort_field,
            config.remote.page_size,
            Duration::from_secs(config.remote.timeout_secs),
        )
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/api/v2/tables/{}/records", self.base_url, table)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    /// Sort by key, then by `Id`, so offset paging over tied keys is stable.
    fn sort_param(&self) -> String {
        format!("{},Id", self.sort_field)
    }

    async fn fetch_page(&self, table: &str, offset: usize) -> Result<RecordPage> {
        let sort = self.sort_param();
        let limit = self.page_size.to_string();
        let offset = offset.to_string();
        self.authorized(self.client.get(self.records_url(table)))
            .query(&[
                ("sort", sort.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send records request for table {}", table))?
            .error_for_status()
            .with_context(|| format!("Records API returned error status for table {}", table))?
            .json::<RecordPage>()
            .await
            .with_context(|| format!("Failed to parse records response for table {}", table))
    }

    async fn patch_records(&self, table: &str, writes: &[(String, f64)]) -> Result<()> {
        let body: Vec<Value> = writes
            .iter()
            .map(|(id, key)| {
                let mut record = Map::new();
                record.insert("Id".to_string(), id_value(id));
                record.insert(self.sort_field.clone(), Value::from(*key));
                Value::Object(record)
            })
            .collect();

        self.authorized(self.client.patch(self.records_url(table)))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send update for table {}", table))?
            .error_for_status()
            .with_context(|| format!("Records API rejected update for table {}", table))?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for RemoteStore {
    async fn list_items(&self, collection: &str) -> Result<Vec<OrderedItem>> {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(collection, offset).await?;
            let count = page.list.len();
            for record in &page.list {
                match record_id(record) {
                    Some(id) => items.push(OrderedItem::new(id, record_key(record, &self.sort_field))),
                    None => warn!(table = collection, "skipping record without an id"),
                }
            }
            offset += count;

            let last = page.page_info.is_last_page.unwrap_or(count < self.page_size);
            if last || count == 0 {
                break;
            }
        }

        debug!(table = collection, count = items.len(), "fetched remote records");
        sort_items(&mut items);
        Ok(items)
    }

    async fn update_sort_key(&self, collection: &str, item_id: &str, key: f64) -> Result<()> {
        self.patch_records(collection, &[(item_id.to_string(), key)])
            .await
    }

    /// One PATCH per `page_size` records.
    async fn update_sort_keys(&self, collection: &str, writes: &[(String, f64)]) -> Result<()> {
        for chunk in writes.chunks(self.page_size) {
            self.patch_records(collection, chunk).await?;
        }
        debug!(table = collection, written = writes.len(), "patched remote keys");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}
