//! Configuration for the cgrid tool
//!
//! Provides types, discovery and parsing for `cgrid.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
