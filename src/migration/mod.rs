// ABOUTME: Migration module: enumerate source collections and copy them one by one
// ABOUTME: Produces a MigrationReport with one outcome per attempted collection

pub mod copier;
pub mod enumerate;
pub mod report;

pub use copier::copy_collection;
pub use enumerate::list_collections;
pub use report::{CollectionOutcome, CollectionStatus, MigrationReport};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::filters::CollectionFilter;
use crate::store::VectorStore;
use std::time::Instant;

/// Knobs for a migration run
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Rows fetched per cursor page and inserted per request
    pub batch_size: usize,
    pub filter: CollectionFilter,
    /// Draw a progress bar during the data phase
    pub show_progress: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            filter: CollectionFilter::empty(),
            show_progress: false,
        }
    }
}

/// Copy every selected source collection to the target, sequentially
///
/// Per-collection errors never abort the loop; they end up in the report.
pub async fn run_migration(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    options: &MigrationOptions,
) -> MigrationReport {
    let started = Instant::now();

    let collections = list_collections(source).await;
    tracing::info!(
        "Found {} collections in {}: {:?}",
        collections.len(),
        source.alias(),
        collections
    );

    let selected = options.filter.apply(collections);
    if !options.filter.is_empty() {
        tracing::info!("{} collections selected by filter", selected.len());
    }

    let mut report = MigrationReport::default();
    for name in &selected {
        report
            .outcomes
            .push(copy_collection(source, target, name, options).await);
    }
    report.elapsed = started.elapsed();

    tracing::info!(
        "✨ Migration finished: {} migrated, {} partial, {} failed",
        report.migrated(),
        report.partial(),
        report.failed()
    );
    report
}
