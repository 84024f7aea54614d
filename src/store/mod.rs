// ABOUTME: Capability interface over a vector-database session
// ABOUTME: Defines collection schema, index and row types shared by all store backends

pub mod memory;
pub mod milvus;

pub use memory::MemoryStore;
pub use milvus::{Endpoint, MilvusClient, MAX_QUERY_LIMIT};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single entity as returned by a query: field name to value
pub type Row = serde_json::Map<String, Value>;

/// Typed field of a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    /// Server type name, e.g. `Int64`, `VarChar`, `FloatVector`
    pub data_type: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub is_partition_key: bool,
    /// Element type for `Array` fields
    #[serde(default)]
    pub element_type: Option<String>,
    /// Type parameters such as `dim` or `max_length`
    #[serde(default)]
    pub type_params: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl FieldSchema {
    pub fn is_vector(&self) -> bool {
        self.data_type.ends_with("Vector")
    }
}

/// Ordered field list plus collection-level schema flags
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub enable_dynamic_field: bool,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }
}

/// Index definition on one field of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub field_name: String,
    pub index_name: String,
    /// Index algorithm, e.g. `HNSW` or `AUTOINDEX`
    #[serde(default)]
    pub index_type: Option<String>,
    #[serde(default)]
    pub metric_type: Option<String>,
    /// Build parameters such as `M` or `efConstruction`
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Forward-only page iterator over the rows of a collection
///
/// Returns `Ok(None)` once exhausted. A cursor cannot be rewound; open a new
/// one with [`VectorStore::query_cursor`] to read again.
#[async_trait]
pub trait RowCursor: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;
}

/// Operations the migrator and verifier need from a vector-database session
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Session alias used in log lines (`source`, `target`)
    fn alias(&self) -> &str;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Materialize a collection so it can be queried
    async fn load_collection(&self, name: &str) -> Result<()>;

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema>;

    async fn list_indexes(&self, name: &str) -> Result<Vec<IndexDescription>>;

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()>;

    async fn create_index(&self, name: &str, index: &IndexDescription) -> Result<()>;

    async fn query_cursor(
        &self,
        name: &str,
        page_size: usize,
        output_fields: &[String],
    ) -> Result<Box<dyn RowCursor>>;

    /// Insert rows, returning how many the store accepted
    async fn insert(&self, name: &str, rows: &[Row]) -> Result<u64>;

    async fn flush(&self, name: &str) -> Result<()>;

    /// List databases; an error means the store does not support it
    async fn list_databases(&self) -> Result<Vec<String>>;

    async fn collection_stats(&self, name: &str) -> Result<BTreeMap<String, Value>>;

    /// Row count taken from the `rowCount` statistic
    async fn row_count(&self, name: &str) -> Result<u64> {
        let stats = self.collection_stats(name).await?;
        stats
            .get("rowCount")
            .and_then(parse_count)
            .with_context(|| format!("Statistics for '{}' carry no rowCount", name))
    }
}

/// Accept counts encoded either as JSON numbers or as numeric strings
pub fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
}
