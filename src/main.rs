// ABOUTME: CLI entry point for milvus-cloud-migrator
// ABOUTME: Parses commands and environment into explicit configs and routes to handlers

use clap::{Args, Parser, Subcommand};
use milvus_cloud_migrator::commands;
use milvus_cloud_migrator::config::{MigrateConfig, SourceSettings, TargetSettings, VerifyConfig};

#[derive(Parser)]
#[command(name = "milvus-cloud-migrator")]
#[command(about = "Copy Milvus collections to Zilliz Cloud and verify the result", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Target deployment URI (e.g. https://in03-xxx.zillizcloud.com)
    #[arg(long, env = "TARGET_URI")]
    target_uri: Option<String>,
    /// Target API token
    #[arg(long, env = "TARGET_TOKEN", hide_env_values = true)]
    target_token: Option<String>,
    /// Target database (server default if unset)
    #[arg(long, env = "TARGET_DB_NAME")]
    target_db: Option<String>,
}

impl TargetArgs {
    fn into_settings(self) -> anyhow::Result<TargetSettings> {
        TargetSettings::new(self.target_uri, self.target_token, self.target_db)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every collection (schema, indexes, rows) from source to target
    Migrate {
        #[arg(long, env = "SOURCE_HOST", default_value = "localhost")]
        source_host: String,
        #[arg(long, env = "SOURCE_PORT", default_value_t = 19530)]
        source_port: u16,
        #[arg(long, env = "SOURCE_USER")]
        source_user: Option<String>,
        #[arg(long, env = "SOURCE_PASSWORD", hide_env_values = true)]
        source_password: Option<String>,
        /// Source database (server default if unset)
        #[arg(long, env = "SOURCE_DB_NAME")]
        source_db: Option<String>,
        #[command(flatten)]
        target: TargetArgs,
        /// Rows per cursor page and insert request (default 1000, at most 16384)
        #[arg(long, env = "MIGRATION_BATCH_SIZE")]
        batch_size: Option<usize>,
        /// Migrate only these collections (comma-separated)
        #[arg(long, value_delimiter = ',')]
        include_collections: Option<Vec<String>>,
        /// Skip these collections (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_collections: Option<Vec<String>>,
        /// TOML file with [collections] and [transfer] settings
        #[arg(long, env = "MIGRATION_CONFIG")]
        config: Option<String>,
        /// Print the report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
        /// Exit with an error if any collection is partial or failed
        #[arg(long)]
        strict: bool,
    },
    /// List databases, collections and statistics on the target
    Verify {
        #[command(flatten)]
        target: TargetArgs,
        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            source_host,
            source_port,
            source_user,
            source_password,
            source_db,
            target,
            batch_size,
            include_collections,
            exclude_collections,
            config,
            json,
            strict,
        } => {
            let source = SourceSettings {
                host: source_host,
                port: source_port,
                user: source_user,
                password: source_password,
                db_name: source_db,
            };
            let config = MigrateConfig::new(
                source,
                target.into_settings()?,
                batch_size,
                include_collections,
                exclude_collections,
                config.as_deref(),
            )?;
            commands::migrate(&config, json, strict).await?;
            Ok(())
        }
        Commands::Verify { target, json } => {
            let config = VerifyConfig {
                target: target.into_settings()?,
            };
            commands::verify(&config, json).await?;
            Ok(())
        }
    }
}
