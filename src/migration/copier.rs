// ABOUTME: Copies one collection end to end: schema, indexes, then rows page by page
// ABOUTME: Turns every step's error into a per-collection outcome instead of aborting the run

use super::report::CollectionOutcome;
use super::MigrationOptions;
use crate::store::{CollectionSchema, RowCursor, VectorStore};
use crate::utils::sanitize_identifier;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

/// Reproduce `name` from `source` on `target`
///
/// Steps, in order:
/// 1. Load the source collection, read its schema and row count
/// 2. Reuse a target collection of the same name, or create it with the
///    source schema and recreate the source indexes (index failures are
///    recorded, not fatal)
/// 3. Stream rows through a forward cursor, inserting each page as it arrives
/// 4. Flush the target collection
///
/// An empty source collection stops after step 2. Existing target
/// collections are appended to, so running twice duplicates rows.
pub async fn copy_collection(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    name: &str,
    options: &MigrationOptions,
) -> CollectionOutcome {
    let shown = sanitize_identifier(name);
    tracing::info!("Migrating collection '{}'", shown);
    let mut outcome = CollectionOutcome::new(name);

    let (schema, row_count) = match read_source(source, name).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("  ✗ Error migrating '{}': {:#}", shown, e);
            return outcome.failed(format!("{:#}", e));
        }
    };
    outcome.source_rows = row_count;
    tracing::info!("  Source row count: {}", row_count);
    if row_count == 0 {
        tracing::warn!("  ⚠ Collection is empty, creating schema only");
    }

    match prepare_target(target, name, &schema).await {
        Ok(created) => outcome.created = created,
        Err(e) => {
            tracing::error!("  ✗ Error migrating '{}': {:#}", shown, e);
            return outcome.failed(format!("{:#}", e));
        }
    }
    if outcome.created {
        copy_indexes(source, target, name, &mut outcome).await;
    }

    if row_count == 0 {
        tracing::info!("  ✓ Schema for '{}' in place", shown);
        return outcome;
    }

    let transfer = transfer_rows(source, target, name, row_count, options, &mut outcome).await;
    if let Err(e) = &transfer {
        tracing::error!("  ✗ Failed to transfer data for '{}': {:#}", shown, e);
    }

    let flushed = target
        .flush(name)
        .await
        .with_context(|| format!("Failed to flush target collection '{}'", shown));
    if let Err(e) = &flushed {
        tracing::error!("  ✗ {:#}", e);
    }

    match (transfer, flushed) {
        (Ok(()), Ok(())) => {
            if outcome.rows_inserted != row_count {
                tracing::warn!(
                    "  ⚠ Inserted {} rows but source reported {}",
                    outcome.rows_inserted,
                    row_count
                );
            }
            tracing::info!("  ✓ Data transfer complete & flushed");
            outcome
        }
        (Err(e), _) | (Ok(()), Err(e)) => outcome.partial(format!("{:#}", e)),
    }
}

async fn read_source(source: &dyn VectorStore, name: &str) -> Result<(CollectionSchema, u64)> {
    source
        .load_collection(name)
        .await
        .with_context(|| format!("Failed to load source collection '{}'", name))?;
    let schema = source
        .describe_collection(name)
        .await
        .with_context(|| format!("Failed to read schema of source collection '{}'", name))?;
    let row_count = source
        .row_count(name)
        .await
        .with_context(|| format!("Failed to read row count of source collection '{}'", name))?;
    Ok((schema, row_count))
}

/// Returns whether the collection was created by this call
async fn prepare_target(
    target: &dyn VectorStore,
    name: &str,
    schema: &CollectionSchema,
) -> Result<bool> {
    let exists = target
        .has_collection(name)
        .await
        .with_context(|| format!("Failed to check target for collection '{}'", name))?;
    if exists {
        tracing::warn!(
            "  ⚠ Collection '{}' already exists on target. Appending data...",
            sanitize_identifier(name)
        );
        return Ok(false);
    }

    tracing::info!(
        "  Creating collection '{}' on target",
        sanitize_identifier(name)
    );
    target
        .create_collection(name, schema)
        .await
        .with_context(|| format!("Failed to create collection '{}' on target", name))?;
    Ok(true)
}

async fn copy_indexes(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    name: &str,
    outcome: &mut CollectionOutcome,
) {
    let indexes = match source.list_indexes(name).await {
        Ok(indexes) => indexes,
        Err(e) => {
            tracing::warn!("  ⚠ Could not list source indexes, target auto-indexing may apply: {:#}", e);
            outcome
                .index_failures
                .push(format!("listing source indexes: {:#}", e));
            return;
        }
    };

    for index in &indexes {
        tracing::info!("  Indexing field '{}'", sanitize_identifier(&index.field_name));
        if let Err(e) = target.create_index(name, index).await {
            tracing::warn!(
                "  ⚠ Could not copy index for '{}', target auto-indexing may apply: {:#}",
                sanitize_identifier(&index.field_name),
                e
            );
            outcome
                .index_failures
                .push(format!("field '{}': {:#}", index.field_name, e));
        }
    }
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} rows ({per_sec}, eta {eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

async fn transfer_rows(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    name: &str,
    row_count: u64,
    options: &MigrationOptions,
    outcome: &mut CollectionOutcome,
) -> Result<()> {
    let mut cursor = source
        .query_cursor(name, options.batch_size, &["*".to_string()])
        .await
        .with_context(|| format!("Failed to open query cursor on '{}'", name))?;

    let progress = progress_bar(row_count, options.show_progress);
    let result = pump_pages(cursor.as_mut(), target, name, row_count, &progress, outcome).await;
    match result {
        Ok(()) => progress.finish_and_clear(),
        Err(_) => progress.abandon(),
    }
    result
}

async fn pump_pages(
    cursor: &mut dyn RowCursor,
    target: &dyn VectorStore,
    name: &str,
    row_count: u64,
    progress: &ProgressBar,
    outcome: &mut CollectionOutcome,
) -> Result<()> {
    while let Some(batch) = cursor
        .next_batch()
        .await
        .with_context(|| format!("Failed to read rows from source collection '{}'", name))?
    {
        if batch.is_empty() {
            break;
        }
        let inserted = target
            .insert(name, &batch)
            .await
            .with_context(|| format!("Failed to insert batch of {} rows", batch.len()))?;
        outcome.rows_inserted += inserted;
        progress.inc(inserted);

        if progress.is_hidden() {
            tracing::info!(
                "  Inserted batch of {} (total: {}/{})",
                batch.len(),
                outcome.rows_inserted,
                row_count
            );
        } else {
            tracing::debug!(
                "  Inserted batch of {} (total: {}/{})",
                batch.len(),
                outcome.rows_inserted,
                row_count
            );
        }
    }
    Ok(())
}
