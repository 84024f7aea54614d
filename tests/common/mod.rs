// ABOUTME: Shared fixtures for migration and inventory integration tests
// ABOUTME: Builds schemas, indexes and rows resembling a small RAG collection

#![allow(dead_code)]

use milvus_cloud_migrator::store::{CollectionSchema, FieldSchema, IndexDescription, Row};
use serde_json::json;
use std::collections::BTreeMap;

fn field(name: &str, data_type: &str, params: &[(&str, &str)]) -> FieldSchema {
    FieldSchema {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_primary: false,
        auto_id: false,
        is_partition_key: false,
        element_type: None,
        type_params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        description: String::new(),
    }
}

/// id (Int64 primary key), title (VarChar), vector (FloatVector, dim 4)
pub fn docs_schema() -> CollectionSchema {
    let mut id = field("id", "Int64", &[]);
    id.is_primary = true;

    CollectionSchema {
        auto_id: false,
        enable_dynamic_field: true,
        description: "document chunks".to_string(),
        fields: vec![
            id,
            field("title", "VarChar", &[("max_length", "512")]),
            field("vector", "FloatVector", &[("dim", "4")]),
        ],
    }
}

pub fn docs_indexes() -> Vec<IndexDescription> {
    vec![
        IndexDescription {
            field_name: "vector".to_string(),
            index_name: "vector_idx".to_string(),
            index_type: Some("HNSW".to_string()),
            metric_type: Some("COSINE".to_string()),
            params: BTreeMap::from([
                ("M".to_string(), json!(16)),
                ("efConstruction".to_string(), json!(200)),
            ]),
        },
        IndexDescription {
            field_name: "title".to_string(),
            index_name: "title_idx".to_string(),
            index_type: Some("INVERTED".to_string()),
            metric_type: None,
            params: BTreeMap::new(),
        },
    ]
}

pub fn docs_rows(range: std::ops::Range<i64>) -> Vec<Row> {
    range
        .map(|id| {
            let mut row = Row::new();
            row.insert("id".to_string(), json!(id));
            row.insert("title".to_string(), json!(format!("chunk {}", id)));
            row.insert(
                "vector".to_string(),
                json!([id as f32 * 0.1, 0.2, 0.3, 0.4]),
            );
            row
        })
        .collect()
}

pub fn row_ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(|v| v.as_i64()))
        .collect()
}
