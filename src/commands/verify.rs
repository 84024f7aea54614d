// ABOUTME: Verify command: connect to the target only and print its inventory
// ABOUTME: Listing problems are reported but never turn into a failing exit code

use crate::config::VerifyConfig;
use crate::inventory::{collect_inventory, Inventory};
use crate::store::MilvusClient;
use anyhow::{Context, Result};

/// Print databases, collections and per-collection statistics of the target
pub async fn verify(config: &VerifyConfig, json: bool) -> Result<Inventory> {
    let endpoint = config.target.endpoint();
    tracing::info!("🔌 Connecting to {}...", endpoint);
    let client = MilvusClient::connect("target", endpoint)
        .await
        .context("Failed to connect to target")?;
    tracing::info!("✓ Connected");

    let inventory = collect_inventory(&client).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&inventory).context("Failed to serialize inventory")?
        );
    } else {
        inventory.print();
    }

    Ok(inventory)
}
