// ABOUTME: Lists the collections visible on a session
// ABOUTME: Degrades to an empty list with a warning when the store cannot enumerate

use crate::store::VectorStore;

/// List collection names in the order the store returns them
///
/// A failure is logged and treated as "no collections", so a migration
/// against an unreadable source finishes as a no-op.
pub async fn list_collections(store: &dyn VectorStore) -> Vec<String> {
    match store.list_collections().await {
        Ok(collections) => collections,
        Err(e) => {
            tracing::warn!(
                "⚠ Failed to list collections from {}: {:#}",
                store.alias(),
                e
            );
            Vec::new()
        }
    }
}
