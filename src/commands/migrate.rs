// ABOUTME: Migrate command: connect both sessions, copy every collection, report outcomes
// ABOUTME: Connection failures are fatal; per-collection failures only show up in the report

use crate::config::{MigrateConfig, SourceSettings, TargetSettings};
use crate::migration::{run_migration, MigrationReport};
use crate::store::MilvusClient;
use anyhow::{bail, Context, Result};

/// Establish the `source` and `target` sessions
///
/// # Errors
///
/// Returns an error if either deployment cannot be reached or rejects its
/// credentials. Nothing has been read or written at that point.
pub async fn bootstrap(
    source: &SourceSettings,
    target: &TargetSettings,
) -> Result<(MilvusClient, MilvusClient)> {
    let source_endpoint = source.endpoint();
    tracing::info!("🔌 Connecting to source Milvus ({})...", source_endpoint);
    let source_client = MilvusClient::connect("source", source_endpoint)
        .await
        .context("Failed to connect to source")?;
    tracing::info!("✓ Connected to source");

    let target_endpoint = target.endpoint();
    tracing::info!("🔌 Connecting to target Milvus ({})...", target_endpoint);
    let target_client = MilvusClient::connect("target", target_endpoint)
        .await
        .context("Failed to connect to target")?;
    tracing::info!("✓ Connected to target");

    Ok((source_client, target_client))
}

/// Copy all selected collections from source to target
///
/// Prints the run summary (or the JSON report when `json` is set). With
/// `strict`, a run that left any collection partial or failed returns an
/// error after the report is printed.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use milvus_cloud_migrator::commands;
/// # use milvus_cloud_migrator::config::{MigrateConfig, SourceSettings, TargetSettings};
/// # async fn example() -> Result<()> {
/// let source = SourceSettings {
///     host: "localhost".into(),
///     port: 19530,
///     user: Some("root".into()),
///     password: Some("Milvus".into()),
///     db_name: None,
/// };
/// let target = TargetSettings::new(
///     Some("https://in03-abc.zillizcloud.com".into()),
///     Some("api-token".into()),
///     None,
/// )?;
/// let config = MigrateConfig::new(source, target, None, None, None, None)?;
/// commands::migrate(&config, false, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn migrate(config: &MigrateConfig, json: bool, strict: bool) -> Result<MigrationReport> {
    let (source, target) = bootstrap(&config.source, &config.target).await?;

    let report = run_migration(&source, &target, &config.options).await;

    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print_summary();
    }

    if strict && !report.is_complete() {
        bail!(
            "{} collection(s) partial and {} failed",
            report.partial(),
            report.failed()
        );
    }

    Ok(report)
}
