pub mod model;

pub use model::{Report, parse_batch};

/// Longest free-form text retained from a report.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Source recorded when a report does not name one.
pub const DEFAULT_SOURCE: &str = "anonymous";

/// Classification recorded when `meta.classification` is absent.
pub const DEFAULT_CLASSIFICATION: &str = "UNCLASSIFIED";
