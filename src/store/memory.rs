// ABOUTME: In-process VectorStore used to exercise the migrator without a server
// ABOUTME: Records call counts and can be told to fail individual operations

use super::{CollectionSchema, IndexDescription, Row, RowCursor, VectorStore};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemoryCollection {
    name: String,
    schema: CollectionSchema,
    indexes: Vec<IndexDescription>,
    rows: Vec<Row>,
    loaded: bool,
}

#[derive(Debug, Default)]
struct Failures {
    list_collections: bool,
    list_databases: bool,
    list_indexes: bool,
    flush: bool,
    load: HashSet<String>,
    describe: HashSet<String>,
    create: HashSet<String>,
    stats: HashSet<String>,
    index_fields: HashSet<String>,
    /// Fail every insert once this many inserts have succeeded
    insert_after: Option<usize>,
}

#[derive(Debug, Default)]
struct Calls {
    list_collections: usize,
    create_collection: usize,
    create_index: usize,
    insert: usize,
    flush: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: Vec<MemoryCollection>,
    databases: Vec<String>,
    failures: Failures,
    calls: Calls,
}

impl MemoryState {
    fn collection(&self, name: &str) -> Result<&MemoryCollection> {
        match self.collections.iter().find(|c| c.name == name) {
            Some(collection) => Ok(collection),
            None => bail!("collection not found [collection={}]", name),
        }
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut MemoryCollection> {
        match self.collections.iter_mut().find(|c| c.name == name) {
            Some(collection) => Ok(collection),
            None => bail!("collection not found [collection={}]", name),
        }
    }
}

/// Vector store kept entirely in memory
///
/// Collections are listed in the order they were added. Like Milvus, the
/// store does not reject duplicate primary keys on insert, and a collection
/// must be loaded before it can be queried.
#[derive(Debug)]
pub struct MemoryStore {
    alias: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            state: Mutex::new(MemoryState {
                databases: vec!["default".to_string()],
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a collection with a schema, indexes and rows
    pub fn with_collection(
        self,
        name: &str,
        schema: CollectionSchema,
        indexes: Vec<IndexDescription>,
        rows: Vec<Row>,
    ) -> Self {
        self.state().collections.push(MemoryCollection {
            name: name.to_string(),
            schema,
            indexes,
            rows,
            loaded: false,
        });
        self
    }

    pub fn with_databases(self, databases: &[&str]) -> Self {
        self.state().databases = databases.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn fail_list_collections(self) -> Self {
        self.state().failures.list_collections = true;
        self
    }

    /// Behave like a store without multi-database support
    pub fn fail_list_databases(self) -> Self {
        self.state().failures.list_databases = true;
        self
    }

    pub fn fail_list_indexes(self) -> Self {
        self.state().failures.list_indexes = true;
        self
    }

    pub fn fail_flush(self) -> Self {
        self.state().failures.flush = true;
        self
    }

    pub fn fail_load(self, collection: &str) -> Self {
        self.state().failures.load.insert(collection.to_string());
        self
    }

    pub fn fail_describe(self, collection: &str) -> Self {
        self.state().failures.describe.insert(collection.to_string());
        self
    }

    pub fn fail_create(self, collection: &str) -> Self {
        self.state().failures.create.insert(collection.to_string());
        self
    }

    pub fn fail_stats(self, collection: &str) -> Self {
        self.state().failures.stats.insert(collection.to_string());
        self
    }

    /// Reject index creation on any collection for this field
    pub fn fail_index_on(self, field: &str) -> Self {
        self.state().failures.index_fields.insert(field.to_string());
        self
    }

    pub fn fail_insert_after(self, successful_inserts: usize) -> Self {
        self.state().failures.insert_after = Some(successful_inserts);
        self
    }

    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.state()
            .collection(collection)
            .map(|c| c.rows.clone())
            .unwrap_or_default()
    }

    pub fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.state()
            .collection(collection)
            .ok()
            .map(|c| c.schema.clone())
    }

    pub fn indexes(&self, collection: &str) -> Vec<IndexDescription> {
        self.state()
            .collection(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    pub fn list_collections_calls(&self) -> usize {
        self.state().calls.list_collections
    }

    pub fn create_collection_calls(&self) -> usize {
        self.state().calls.create_collection
    }

    pub fn create_index_calls(&self) -> usize {
        self.state().calls.create_index
    }

    pub fn insert_calls(&self) -> usize {
        self.state().calls.insert
    }

    pub fn flush_calls(&self) -> usize {
        self.state().calls.flush
    }
}

struct MemoryCursor {
    pending: VecDeque<Row>,
    page_size: usize,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.page_size.min(self.pending.len());
        Ok(Some(self.pending.drain(..take).collect()))
    }
}

fn project(row: &Row, output_fields: &[String]) -> Row {
    if output_fields.is_empty() || output_fields.iter().any(|f| f == "*") {
        return row.clone();
    }
    row.iter()
        .filter(|(key, _)| output_fields.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn alias(&self) -> &str {
        &self.alias
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        state.calls.list_collections += 1;
        if state.failures.list_collections {
            bail!("list collections rejected by server");
        }
        Ok(state.collections.iter().map(|c| c.name.clone()).collect())
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.state().collections.iter().any(|c| c.name == name))
    }

    async fn load_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.failures.load.contains(name) {
            bail!("failed to load collection [collection={}]", name);
        }
        state.collection_mut(name)?.loaded = true;
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let state = self.state();
        if state.failures.describe.contains(name) {
            bail!("describe rejected [collection={}]", name);
        }
        Ok(state.collection(name)?.schema.clone())
    }

    async fn list_indexes(&self, name: &str) -> Result<Vec<IndexDescription>> {
        let state = self.state();
        if state.failures.list_indexes {
            bail!("list indexes rejected [collection={}]", name);
        }
        Ok(state.collection(name)?.indexes.clone())
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.state();
        state.calls.create_collection += 1;
        if state.failures.create.contains(name) {
            bail!("create rejected [collection={}]", name);
        }
        if state.collections.iter().any(|c| c.name == name) {
            bail!("collection already exists [collection={}]", name);
        }
        state.collections.push(MemoryCollection {
            name: name.to_string(),
            schema: schema.clone(),
            indexes: Vec::new(),
            rows: Vec::new(),
            loaded: false,
        });
        Ok(())
    }

    async fn create_index(&self, name: &str, index: &IndexDescription) -> Result<()> {
        let mut state = self.state();
        state.calls.create_index += 1;
        if state.failures.index_fields.contains(&index.field_name) {
            bail!(
                "index type not supported [collection={}, field={}]",
                name,
                index.field_name
            );
        }
        let collection = state.collection_mut(name)?;
        if !collection
            .schema
            .fields
            .iter()
            .any(|f| f.name == index.field_name)
        {
            bail!("field not found [field={}]", index.field_name);
        }
        collection.indexes.push(index.clone());
        Ok(())
    }

    async fn query_cursor(
        &self,
        name: &str,
        page_size: usize,
        output_fields: &[String],
    ) -> Result<Box<dyn RowCursor>> {
        if page_size == 0 {
            bail!("page size must be greater than zero");
        }
        let state = self.state();
        let collection = state.collection(name)?;
        if !collection.loaded {
            bail!("collection not loaded [collection={}]", name);
        }
        let pending = collection
            .rows
            .iter()
            .map(|row| project(row, output_fields))
            .collect();
        Ok(Box::new(MemoryCursor { pending, page_size }))
    }

    async fn insert(&self, name: &str, rows: &[Row]) -> Result<u64> {
        let mut state = self.state();
        if let Some(limit) = state.failures.insert_after {
            if state.calls.insert >= limit {
                state.calls.insert += 1;
                bail!("connection reset while inserting [collection={}]", name);
            }
        }
        state.calls.insert += 1;
        state.collection_mut(name)?.rows.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn flush(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.flush += 1;
        if state.failures.flush {
            bail!("flush rejected [collection={}]", name);
        }
        state.collection(name)?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let state = self.state();
        if state.failures.list_databases {
            bail!("database listing is not supported on this deployment");
        }
        Ok(state.databases.clone())
    }

    async fn collection_stats(&self, name: &str) -> Result<BTreeMap<String, Value>> {
        let state = self.state();
        if state.failures.stats.contains(name) {
            bail!("stats unavailable [collection={}]", name);
        }
        let collection = state.collection(name)?;
        Ok(BTreeMap::from([(
            "rowCount".to_string(),
            json!(collection.rows.len()),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldSchema;

    fn schema() -> CollectionSchema {
        CollectionSchema {
            fields: vec![FieldSchema {
                name: "id".to_string(),
                data_type: "Int64".to_string(),
                is_primary: true,
                auto_id: false,
                is_partition_key: false,
                element_type: None,
                type_params: BTreeMap::new(),
                description: String::new(),
            }],
            ..Default::default()
        }
    }

    fn row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(id));
        row.insert("text".to_string(), json!(format!("row {}", id)));
        row
    }

    #[tokio::test]
    async fn test_cursor_pages_until_exhausted() {
        let store = MemoryStore::new("source").with_collection(
            "docs",
            schema(),
            Vec::new(),
            (0..5).map(row).collect(),
        );
        store.load_collection("docs").await.unwrap();

        let mut cursor = store
            .query_cursor("docs", 2, &["*".to_string()])
            .await
            .unwrap();
        let mut sizes = Vec::new();
        while let Some(batch) = cursor.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }

        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(cursor.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_requires_loaded_collection() {
        let store =
            MemoryStore::new("source").with_collection("docs", schema(), Vec::new(), vec![row(1)]);

        let result = store.query_cursor("docs", 10, &["*".to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_projection_keeps_requested_fields() {
        let store =
            MemoryStore::new("source").with_collection("docs", schema(), Vec::new(), vec![row(1)]);
        store.load_collection("docs").await.unwrap();

        let mut cursor = store
            .query_cursor("docs", 10, &["id".to_string()])
            .await
            .unwrap();
        let batch = cursor.next_batch().await.unwrap().unwrap();

        assert_eq!(batch[0].len(), 1);
        assert!(batch[0].contains_key("id"));
    }

    #[tokio::test]
    async fn test_insert_failure_after_limit() {
        let store = MemoryStore::new("target")
            .with_collection("docs", schema(), Vec::new(), Vec::new())
            .fail_insert_after(1);

        assert!(store.insert("docs", &[row(1)]).await.is_ok());
        assert!(store.insert("docs", &[row(2)]).await.is_err());
        assert_eq!(store.rows("docs").len(), 1);
        assert_eq!(store.insert_calls(), 2);
    }

    #[tokio::test]
    async fn test_row_count_comes_from_stats() {
        let store = MemoryStore::new("source").with_collection(
            "docs",
            schema(),
            Vec::new(),
            vec![row(1), row(2)],
        );

        assert_eq!(store.row_count("docs").await.unwrap(), 2);
    }
}
