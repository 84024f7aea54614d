// ABOUTME: Library module for milvus-cloud-migrator
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod filters;
pub mod inventory;
pub mod migration;
pub mod store;
pub mod utils;
