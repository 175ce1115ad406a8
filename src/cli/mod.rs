//! Terminal output helpers for the `uniteam` binary.

pub mod outputformatter;

pub use outputformatter::{json_forced, print_json, print_records};
