// ABOUTME: Read-only inventory of a store: databases, collections and their statistics
// ABOUTME: Each lookup is best-effort so one bad collection never hides the rest

use crate::store::VectorStore;
use crate::utils::sanitize_identifier;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    /// `None` when statistics could not be fetched
    pub stats: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    /// `None` when the store cannot list databases; only `default` is assumed
    pub databases: Option<Vec<String>>,
    pub collections: Vec<CollectionSummary>,
    /// Set when listing collections failed outright
    pub listing_error: Option<String>,
}

/// Gather databases, collections and per-collection statistics
pub async fn collect_inventory(store: &dyn VectorStore) -> Inventory {
    tracing::info!("Checking databases on {}...", store.alias());
    let databases = match store.list_databases().await {
        Ok(databases) => Some(databases),
        Err(e) => {
            tracing::warn!(
                "⚠ Could not list databases (likely a serverless/free tier deployment): {:#}",
                e
            );
            None
        }
    };

    tracing::info!("Checking collections on {}...", store.alias());
    let (names, listing_error) = match store.list_collections().await {
        Ok(names) => (names, None),
        Err(e) => {
            tracing::error!("✗ Failed to list collections: {:#}", e);
            (Vec::new(), Some(format!("{:#}", e)))
        }
    };

    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let stats = match store.collection_stats(&name).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::debug!(
                    "Statistics unavailable for '{}': {:#}",
                    sanitize_identifier(&name),
                    e
                );
                None
            }
        };
        collections.push(CollectionSummary { name, stats });
    }

    Inventory {
        databases,
        collections,
        listing_error,
    }
}

fn format_stats(stats: &BTreeMap<String, Value>) -> String {
    stats
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl Inventory {
    pub fn print(&self) {
        println!();
        println!("Databases:");
        match &self.databases {
            Some(databases) if !databases.is_empty() => {
                for db in databases {
                    println!("  - {}", sanitize_identifier(db));
                }
            }
            Some(_) => println!("  (none reported)"),
            None => println!("  (listing not supported, assuming 'default' database only)"),
        }

        println!();
        println!("Collections in the active database:");
        if let Some(error) = &self.listing_error {
            println!("  ✗ Failed to list collections: {}", error);
        } else if self.collections.is_empty() {
            println!("  (none)");
        }
        for collection in &self.collections {
            println!("  - {}", sanitize_identifier(&collection.name));
            if let Some(stats) = &collection.stats {
                println!("      Stats: {}", format_stats(stats));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_stats() {
        let stats = BTreeMap::from([
            ("rowCount".to_string(), json!(42)),
            ("state".to_string(), json!("Loaded")),
        ]);
        assert_eq!(format_stats(&stats), "rowCount=42, state=Loaded");
    }
}
