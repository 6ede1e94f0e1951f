#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

/// Prompt truncation length, in characters of submission text
pub const PROMPT_TRUNCATE: usize = 60_000;

/// Opinions below this confidence are ignored when reconciling
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Criterion results below this confidence flag the submission for review
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// How long a single agent query may take
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Agent queries allowed in flight at once, across all criteria
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 8;

/// Address the HTTP API binds to
pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
