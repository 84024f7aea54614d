// ABOUTME: Per-collection outcome records and the aggregated migration report
// ABOUTME: Renders the end-of-run summary as text or JSON

use crate::utils::{format_duration, sanitize_identifier};
use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Every step completed; index failures are recorded separately
    Migrated,
    /// Collection exists on the target but the data phase or flush failed
    Partial { reason: String },
    /// Nothing was written for this collection
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionOutcome {
    pub name: String,
    /// Whether the collection was created on the target by this run
    pub created: bool,
    pub source_rows: u64,
    pub rows_inserted: u64,
    pub index_failures: Vec<String>,
    #[serde(flatten)]
    pub status: CollectionStatus,
}

impl CollectionOutcome {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created: false,
            source_rows: 0,
            rows_inserted: 0,
            index_failures: Vec::new(),
            status: CollectionStatus::Migrated,
        }
    }

    pub(crate) fn failed(mut self, reason: String) -> Self {
        self.status = CollectionStatus::Failed { reason };
        self
    }

    pub(crate) fn partial(mut self, reason: String) -> Self {
        self.status = CollectionStatus::Partial { reason };
        self
    }

    pub fn is_migrated(&self) -> bool {
        self.status == CollectionStatus::Migrated
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Result of one `migrate` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub outcomes: Vec<CollectionOutcome>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn migrated(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_migrated()).count()
    }

    pub fn partial(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, CollectionStatus::Partial { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, CollectionStatus::Failed { .. }))
            .count()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_inserted).sum()
    }

    /// True when no collection ended partial or failed
    pub fn is_complete(&self) -> bool {
        self.partial() == 0 && self.failed() == 0
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize migration report")
    }

    pub fn print_summary(&self) {
        println!();
        println!("========================================");
        println!("Migration Summary");
        println!("========================================");
        println!();

        if self.outcomes.is_empty() {
            println!("No collections were migrated.");
        }

        for outcome in &self.outcomes {
            let name = sanitize_identifier(&outcome.name);
            match &outcome.status {
                CollectionStatus::Migrated => println!(
                    "  ✓ {} ({} of {} rows{})",
                    name,
                    outcome.rows_inserted,
                    outcome.source_rows,
                    if outcome.created { ", created" } else { ", appended" }
                ),
                CollectionStatus::Partial { reason } => println!(
                    "  ⚠ {} partial ({} of {} rows): {}",
                    name, outcome.rows_inserted, outcome.source_rows, reason
                ),
                CollectionStatus::Failed { reason } => println!("  ✗ {} failed: {}", name, reason),
            }
            for failure in &outcome.index_failures {
                println!("      index not copied: {}", failure);
            }
        }

        println!();
        println!(
            "Collections: {} migrated, {} partial, {} failed",
            self.migrated(),
            self.partial(),
            self.failed()
        );
        println!("Rows inserted: {}", self.rows_inserted());
        println!("Elapsed: {}", format_duration(self.elapsed));
    }
}
