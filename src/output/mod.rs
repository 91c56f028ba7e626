//! Output formatters for scan results, matches and cache statistics.
//!
//! - [`text`] for people
//! - [`json`] for automation and scripting

pub mod json;
pub mod text;

pub use json::{write_json, JsonCacheStats, JsonFindOutput, JsonOutputError, JsonScanOutput};
