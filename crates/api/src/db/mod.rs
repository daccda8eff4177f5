//! Shared database schema, migrations, and query builders.

pub mod dining_tables;
pub mod migrations;
pub mod payments;
pub mod restaurants;
pub mod sessions;
pub mod tables;

// Re-export tables for convenience
pub use tables::*;

pub type Built = (String, sea_query::Values);
