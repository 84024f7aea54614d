// ABOUTME: Command implementations for the migrator binary
// ABOUTME: Exports the migrate and verify commands

pub mod migrate;
pub mod verify;

pub use migrate::migrate;
pub use verify::verify;
