// ABOUTME: Builds the explicit run configuration from CLI/env values and an optional TOML file
// ABOUTME: Validates connection settings once at startup so business logic never reads the environment

use crate::filters::CollectionFilter;
use crate::migration::MigrationOptions;
use crate::store::{Endpoint, MAX_QUERY_LIMIT};
use crate::utils::redact_url;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Self-hosted source deployment, addressed by host and port
#[derive(Clone, PartialEq)]
pub struct SourceSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub db_name: Option<String>,
}

impl SourceSettings {
    /// Endpoint for the source; a user turns into a `user:password` token
    pub fn endpoint(&self) -> Endpoint {
        let token = self
            .user
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|user| format!("{}:{}", user, self.password.as_deref().unwrap_or("")));
        Endpoint::new(
            &format!("{}:{}", self.host, self.port),
            token,
            self.db_name.clone(),
        )
    }
}

/// Managed target deployment, addressed by URI and API token
#[derive(Clone, PartialEq)]
pub struct TargetSettings {
    uri: String,
    token: String,
    db_name: Option<String>,
}

impl TargetSettings {
    /// Both URI and token are mandatory
    ///
    /// # Errors
    ///
    /// Returns an error if either value is missing or blank.
    pub fn new(uri: Option<String>, token: Option<String>, db_name: Option<String>) -> Result<Self> {
        let uri = uri.map(|u| u.trim().to_string()).unwrap_or_default();
        let token = token.map(|t| t.trim().to_string()).unwrap_or_default();
        if uri.is_empty() || token.is_empty() {
            bail!(
                "TARGET_URI and TARGET_TOKEN must be set.\n\
                 Pass --target-uri/--target-token or export TARGET_URI and TARGET_TOKEN."
            );
        }
        Ok(Self { uri, token, db_name })
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.uri, Some(self.token.clone()), self.db_name.clone())
    }
}

// Credentials stay out of Debug output so configs can be logged.
impl fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db_name", &self.db_name)
            .finish()
    }
}

impl fmt::Debug for TargetSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSettings")
            .field("uri", &redact_url(&self.uri))
            .field("token", &"***")
            .field("db_name", &self.db_name)
            .finish()
    }
}

/// Everything the `migrate` command needs, validated
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub source: SourceSettings,
    pub target: TargetSettings,
    pub options: MigrationOptions,
}

impl MigrateConfig {
    /// Merge CLI values with an optional config file; CLI values win
    pub fn new(
        source: SourceSettings,
        target: TargetSettings,
        batch_size: Option<usize>,
        include: Option<Vec<String>>,
        exclude: Option<Vec<String>>,
        config_path: Option<&str>,
    ) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_settings_from_file(path)?,
            None => FileSettings::default(),
        };

        let batch_size = batch_size
            .or(file.transfer.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("Batch size must be greater than zero");
        }
        if batch_size > MAX_QUERY_LIMIT {
            bail!(
                "Batch size {} exceeds the Milvus query limit of {} rows",
                batch_size,
                MAX_QUERY_LIMIT
            );
        }

        let filter = if include.is_some() || exclude.is_some() {
            CollectionFilter::new(include, exclude)?
        } else {
            CollectionFilter::new(file.collections.include, file.collections.exclude)
                .context("Invalid [collections] section in config file")?
        };

        Ok(Self {
            source,
            target,
            options: MigrationOptions {
                batch_size,
                filter,
                show_progress: true,
            },
        })
    }
}

/// Everything the `verify` command needs, validated
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub target: TargetSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub collections: CollectionSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionSettings {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferSettings {
    pub batch_size: Option<usize>,
}

pub fn load_settings_from_file(path: &str) -> Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse TOML config at {}", path))
}
