// ABOUTME: Milvus / Zilliz Cloud session over the RESTful v2 HTTP API
// ABOUTME: Maps VectorStore operations onto /v2/vectordb endpoints and pages rows by primary key

use super::{CollectionSchema, FieldSchema, IndexDescription, Row, RowCursor, VectorStore};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Seconds between load-state polls
const LOAD_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Polls before a collection that never finishes loading is given up on
const LOAD_POLL_LIMIT: u32 = 300;
/// Largest `limit` Milvus accepts on a single query
pub const MAX_QUERY_LIMIT: usize = 16_384;

/// Where a session points: base URL, bearer token and optional database
#[derive(Clone, PartialEq)]
pub struct Endpoint {
    url: String,
    token: Option<String>,
    db_name: Option<String>,
}

impl Endpoint {
    /// Build an endpoint, normalizing the URL
    ///
    /// A URL without a scheme is treated as plain `http://`, and a trailing
    /// slash is removed. Empty tokens and database names are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use milvus_cloud_migrator::store::Endpoint;
    /// let endpoint = Endpoint::new("localhost:19530/", None, None);
    /// assert_eq!(endpoint.url(), "http://localhost:19530");
    /// ```
    pub fn new(url: &str, token: Option<String>, db_name: Option<String>) -> Self {
        let trimmed = url.trim().trim_end_matches('/');
        let url = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        Self {
            url,
            token: token.filter(|t| !t.is_empty()),
            db_name: db_name.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

// Tokens carry credentials, so neither Debug nor Display prints them.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("db_name", &self.db_name)
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::utils::redact_url(&self.url))?;
        if let Some(db) = &self.db_name {
            write!(f, " (database '{}')", db)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

/// HTTP session bound to one Milvus deployment
#[derive(Clone)]
pub struct MilvusClient {
    alias: String,
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl MilvusClient {
    /// Create a session and confirm the server answers
    ///
    /// Lists collections once so bad credentials or an unreachable host fail
    /// here instead of halfway through a migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, rejects the token,
    /// or answers with something that is not a Milvus API response.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use anyhow::Result;
    /// # use milvus_cloud_migrator::store::{Endpoint, MilvusClient};
    /// # async fn example() -> Result<()> {
    /// let endpoint = Endpoint::new("http://localhost:19530", Some("root:Milvus".into()), None);
    /// let client = MilvusClient::connect("source", endpoint).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(alias: &str, endpoint: Endpoint) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let client = Self {
            alias: alias.to_string(),
            http,
            endpoint,
        };

        client
            .post("collections/list", json!({}))
            .await
            .map_err(|e| classify_connection_error(&client.endpoint, e))?;

        Ok(client)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn body(&self, mut payload: Value) -> Value {
        if let (Some(db), Some(map)) = (self.endpoint.db_name(), payload.as_object_mut()) {
            map.insert("dbName".to_string(), json!(db));
        }
        payload
    }

    /// POST to `/v2/vectordb/{path}` and return the `data` member of the reply
    async fn post(&self, path: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/v2/vectordb/{}", self.endpoint.url(), path);
        let mut request = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("Accept-Type-Allow-Int64", "true")
            .json(&self.body(payload));
        if let Some(token) = &self.endpoint.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", path))?;

        tracing::trace!("[{}] {} -> {} {}", self.alias, path, status, text);

        if !status.is_success() {
            bail!("{} returned HTTP {}: {}", path, status, text);
        }

        let envelope: Envelope = serde_json::from_str(&text)
            .with_context(|| format!("Unexpected response from {}: {}", path, text))?;
        if envelope.code != 0 && envelope.code != 200 {
            bail!(
                "{} failed with code {}: {}",
                path,
                envelope.code,
                envelope.message
            );
        }
        Ok(envelope.data)
    }

    async fn wait_until_loaded(&self, name: &str) -> Result<()> {
        for _ in 0..LOAD_POLL_LIMIT {
            let data = self
                .post("collections/get_load_state", json!({ "collectionName": name }))
                .await?;
            let state = data.get("loadState").and_then(Value::as_str).unwrap_or("");
            match state {
                "LoadStateLoaded" => return Ok(()),
                "LoadStateNotExist" => bail!("Collection '{}' does not exist", name),
                _ => {
                    let progress = data.get("loadProgress").and_then(Value::as_u64).unwrap_or(0);
                    tracing::debug!(
                        "[{}] waiting for '{}' to load ({}%)",
                        self.alias,
                        name,
                        progress
                    );
                    tokio::time::sleep(LOAD_POLL_INTERVAL).await;
                }
            }
        }
        bail!(
            "Collection '{}' did not finish loading after {} checks",
            name,
            LOAD_POLL_LIMIT
        )
    }
}

#[async_trait]
impl VectorStore for MilvusClient {
    fn alias(&self) -> &str {
        &self.alias
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let data = self.post("collections/list", json!({})).await?;
        Ok(string_list(&data, "collections"))
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        let data = self
            .post("collections/has", json!({ "collectionName": name }))
            .await?;
        data.get("has")
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow!("collections/has returned no 'has' flag for '{}'", name))
    }

    async fn load_collection(&self, name: &str) -> Result<()> {
        self.post("collections/load", json!({ "collectionName": name }))
            .await?;
        self.wait_until_loaded(name).await
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let data = self
            .post("collections/describe", json!({ "collectionName": name }))
            .await?;
        parse_collection_schema(&data)
            .with_context(|| format!("Failed to read schema of collection '{}'", name))
    }

    async fn list_indexes(&self, name: &str) -> Result<Vec<IndexDescription>> {
        let data = self
            .post("indexes/list", json!({ "collectionName": name }))
            .await?;
        let mut indexes = Vec::new();
        for index_name in string_list(&data, "indexes") {
            let described = self
                .post(
                    "indexes/describe",
                    json!({ "collectionName": name, "indexName": index_name }),
                )
                .await?;
            indexes.extend(parse_index_descriptions(&described));
        }
        Ok(indexes)
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        self.post("collections/create", create_collection_payload(name, schema))
            .await?;
        Ok(())
    }

    async fn create_index(&self, name: &str, index: &IndexDescription) -> Result<()> {
        self.post("indexes/create", create_index_payload(name, index))
            .await?;
        Ok(())
    }

    async fn query_cursor(
        &self,
        name: &str,
        page_size: usize,
        output_fields: &[String],
    ) -> Result<Box<dyn RowCursor>> {
        if page_size == 0 || page_size > MAX_QUERY_LIMIT {
            bail!(
                "page size must be between 1 and {}, got {}",
                MAX_QUERY_LIMIT,
                page_size
            );
        }
        let schema = self.describe_collection(name).await?;
        let primary = schema
            .primary_field()
            .cloned()
            .with_context(|| format!("Collection '{}' has no primary key field", name))?;

        let mut fields: Vec<String> = if output_fields.is_empty() {
            vec!["*".to_string()]
        } else {
            output_fields.to_vec()
        };
        if !fields.iter().any(|f| f == "*" || f == &primary.name) {
            fields.push(primary.name.clone());
        }

        Ok(Box::new(MilvusCursor {
            client: self.clone(),
            collection: name.to_string(),
            primary,
            output_fields: fields,
            page_size,
            last_pk: None,
            exhausted: false,
        }))
    }

    async fn insert(&self, name: &str, rows: &[Row]) -> Result<u64> {
        let data = self
            .post(
                "entities/insert",
                json!({ "collectionName": name, "data": rows }),
            )
            .await?;
        Ok(data
            .get("insertCount")
            .and_then(super::parse_count)
            .unwrap_or(rows.len() as u64))
    }

    async fn flush(&self, name: &str) -> Result<()> {
        self.post("collections/flush", json!({ "collectionName": name }))
            .await?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let data = self.post("databases/list", json!({})).await?;
        Ok(string_list(&data, "databases"))
    }

    async fn collection_stats(&self, name: &str) -> Result<BTreeMap<String, Value>> {
        let data = self
            .post("collections/get_stats", json!({ "collectionName": name }))
            .await?;
        match data {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => bail!("Unexpected statistics for '{}': {}", name, other),
        }
    }
}

/// Pages through a collection ordered by primary key
struct MilvusCursor {
    client: MilvusClient,
    collection: String,
    primary: FieldSchema,
    output_fields: Vec<String>,
    page_size: usize,
    last_pk: Option<Value>,
    exhausted: bool,
}

#[async_trait]
impl RowCursor for MilvusCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.exhausted {
            return Ok(None);
        }

        let filter = match &self.last_pk {
            Some(last) => primary_key_filter(&self.primary, last)?,
            None => String::new(),
        };
        let data = self
            .client
            .post(
                "entities/query",
                json!({
                    "collectionName": self.collection,
                    "filter": filter,
                    "outputFields": self.output_fields,
                    "limit": self.page_size,
                }),
            )
            .await
            .with_context(|| format!("Failed to query rows of '{}'", self.collection))?;

        let rows: Vec<Row> = match data {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            Value::Null => Vec::new(),
            other => bail!("Unexpected query result for '{}': {}", self.collection, other),
        };

        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        match max_primary_key(&rows, &self.primary) {
            Some(pk) => self.last_pk = Some(pk),
            None => bail!(
                "Rows of '{}' came back without primary key '{}'",
                self.collection,
                self.primary.name
            ),
        }
        Ok(Some(rows))
    }
}

fn classify_connection_error(endpoint: &Endpoint, error: anyhow::Error) -> anyhow::Error {
    let message = format!("{:#}", error);
    let lower = message.to_lowercase();

    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("authenticat")
        || lower.contains("token")
        || lower.contains("password")
    {
        anyhow!(
            "Authentication failed for {}.\n\
             Please verify the user/password or API token.\n\
             Error: {}",
            endpoint,
            message
        )
    } else if lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("error trying to connect")
    {
        anyhow!(
            "Connection refused: unable to reach {}.\n\
             Please check:\n\
             - The host and port are correct\n\
             - The Milvus server is running\n\
             - Firewall rules allow connections\n\
             Error: {}",
            endpoint,
            message
        )
    } else if lower.contains("timed out") || lower.contains("timeout") {
        anyhow!(
            "Connection timeout: {} did not respond in time.\n\
             Error: {}",
            endpoint,
            message
        )
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        anyhow!(
            "TLS error: failed to establish a secure connection to {}.\n\
             Error: {}",
            endpoint,
            message
        )
    } else {
        anyhow!("Failed to connect to {}: {}", endpoint, message)
    }
}

/// Read a list of names that may be bare (`[..]`) or wrapped (`{key: [..]}`)
fn string_list(data: &Value, key: &str) -> Vec<String> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(map) => match map.get(key) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a `collections/describe` reply into a schema
pub fn parse_collection_schema(data: &Value) -> Result<CollectionSchema> {
    let raw_fields = data
        .get("fields")
        .and_then(Value::as_array)
        .context("describe reply has no 'fields' array")?;

    let mut fields = Vec::with_capacity(raw_fields.len());
    for raw in raw_fields {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .context("field without a name")?;
        let data_type = raw
            .get("type")
            .and_then(Value::as_str)
            .with_context(|| format!("field '{}' has no type", name))?;

        let mut type_params = BTreeMap::new();
        if let Some(params) = raw.get("params").and_then(Value::as_array) {
            for param in params {
                if let (Some(key), Some(value)) =
                    (param.get("key").and_then(Value::as_str), param.get("value"))
                {
                    type_params.insert(key.to_string(), param_string(value));
                }
            }
        }

        fields.push(FieldSchema {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_primary: raw
                .get("primaryKey")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            auto_id: raw.get("autoId").and_then(Value::as_bool).unwrap_or(false),
            is_partition_key: raw
                .get("partitionKey")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            element_type: raw
                .get("elementType")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            type_params,
            description: raw
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    Ok(CollectionSchema {
        auto_id: data
            .get("autoId")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| fields.iter().any(|f| f.is_primary && f.auto_id)),
        enable_dynamic_field: data
            .get("enableDynamicField")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        description: data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        fields,
    })
}

/// Build the `collections/create` request for a schema
pub fn create_collection_payload(name: &str, schema: &CollectionSchema) -> Value {
    let fields: Vec<Value> = schema
        .fields
        .iter()
        .map(|field| {
            let mut entry = json!({
                "fieldName": field.name,
                "dataType": field.data_type,
                "isPrimary": field.is_primary,
                "isPartitionKey": field.is_partition_key,
                "elementTypeParams": field.type_params,
            });
            if let Some(element) = &field.element_type {
                entry["elementDataType"] = json!(element);
            }
            if !field.description.is_empty() {
                entry["description"] = json!(field.description);
            }
            entry
        })
        .collect();

    json!({
        "collectionName": name,
        "description": schema.description,
        "schema": {
            "autoId": schema.auto_id,
            "enableDynamicField": schema.enable_dynamic_field,
            "fields": fields,
        },
    })
}

/// Convert an `indexes/describe` reply into index descriptions
pub fn parse_index_descriptions(data: &Value) -> Vec<IndexDescription> {
    let entries: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![data],
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let field_name = entry.get("fieldName").and_then(Value::as_str)?;
            let index_name = entry
                .get("indexName")
                .and_then(Value::as_str)
                .unwrap_or(field_name);
            let text = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let params: BTreeMap<String, Value> = entry
                .get("params")
                .and_then(Value::as_object)
                .map(|p| p.clone().into_iter().collect())
                .unwrap_or_default();

            Some(IndexDescription {
                field_name: field_name.to_string(),
                index_name: index_name.to_string(),
                index_type: text("indexType"),
                metric_type: text("metricType"),
                params,
            })
        })
        .collect()
}

/// Build the `indexes/create` request for one index
pub fn create_index_payload(name: &str, index: &IndexDescription) -> Value {
    let mut params: serde_json::Map<String, Value> = index.params.clone().into_iter().collect();
    let mut entry = json!({
        "fieldName": index.field_name,
        "indexName": index.index_name,
    });
    if let Some(index_type) = &index.index_type {
        entry["indexType"] = json!(index_type);
        params
            .entry("index_type".to_string())
            .or_insert_with(|| json!(index_type));
    }
    if let Some(metric) = &index.metric_type {
        entry["metricType"] = json!(metric);
    }
    if !params.is_empty() {
        entry["params"] = Value::Object(params);
    }

    json!({
        "collectionName": name,
        "indexParams": [entry],
    })
}

/// Filter expression selecting rows after `last` in primary-key order
pub fn primary_key_filter(primary: &FieldSchema, last: &Value) -> Result<String> {
    match primary.data_type.as_str() {
        "Int64" => {
            let n = match last {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            }
            .with_context(|| format!("'{}' is not an Int64 primary key", last))?;
            Ok(format!("{} > {}", primary.name, n))
        }
        "VarChar" | "String" => {
            let s = last
                .as_str()
                .with_context(|| format!("'{}' is not a VarChar primary key", last))?;
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            Ok(format!("{} > \"{}\"", primary.name, escaped))
        }
        other => bail!("Unsupported primary key type '{}'", other),
    }
}

fn compare_keys(primary: &FieldSchema, a: &Value, b: &Value) -> Ordering {
    if primary.data_type == "Int64" {
        let as_int = |v: &Value| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        };
        return as_int(a).cmp(&as_int(b));
    }
    // VarChar keys order the way the server's `pk > "..."` filter does
    a.as_str().cmp(&b.as_str())
}

/// Largest primary key in a page, ordered by the key's declared type
pub fn max_primary_key(rows: &[Row], primary: &FieldSchema) -> Option<Value> {
    rows.iter()
        .filter_map(|row| row.get(&primary.name))
        .max_by(|a, b| compare_keys(primary, a, b))
        .cloned()
}
