//! unconflict core library.
//!
//! This crate provides the pieces behind the `unconflict` tool: conflict
//! marker detection and resolution, file selection policy, the tree scanner
//! that rewrites files in place, configuration, and error types.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod file_policy;
pub mod scanner;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::{resolve, Resolution, ResolveOptions, Resolver, Side};
pub use file_policy::FilePolicy;
pub use scanner::{FileOutcome, ScanReport, Scanner};
