// ABOUTME: Central filtering logic for selective migration
// ABOUTME: Handles collection include/exclude lists

use crate::utils::validate_collection_name;
use anyhow::{bail, Result};

/// Represents collection filtering rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionFilter {
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl CollectionFilter {
    /// Creates a filter from CLI arguments or config file lists
    pub fn new(include: Option<Vec<String>>, exclude: Option<Vec<String>>) -> Result<Self> {
        if include.is_some() && exclude.is_some() {
            bail!("Cannot use both --include-collections and --exclude-collections");
        }

        for name in include.iter().chain(exclude.iter()).flatten() {
            validate_collection_name(name)?;
        }

        Ok(Self { include, exclude })
    }

    /// Creates an empty filter (migrate everything)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Checks if any filters are active
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Determines if a collection should be migrated
    pub fn should_migrate(&self, collection: &str) -> bool {
        if let Some(ref include) = self.include {
            if !include.iter().any(|name| name == collection) {
                return false;
            }
        }

        if let Some(ref exclude) = self.exclude {
            if exclude.iter().any(|name| name == collection) {
                return false;
            }
        }

        true
    }

    /// Keeps the collections that pass the filter, preserving order
    pub fn apply(&self, collections: Vec<String>) -> Vec<String> {
        collections
            .into_iter()
            .filter(|name| self.should_migrate(name))
            .collect()
    }
}
