//! Compose file parsing.
//!
//! This module parses compose files into the records the reconciliation
//! engine operates on, and builds the config/secret binding table.

pub mod bindings;
pub mod parser;
pub mod types;


pub use bindings::FileBindings;
pub use parser::ComposeParser;
pub use types::*;
