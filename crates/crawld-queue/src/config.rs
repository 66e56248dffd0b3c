use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Queue storage configuration.
///
/// Embeds into an application's own config tree (TOML, env, ...). With
/// no `path` the queue lives in a transient in-memory store — useful for
/// tests and one-shot runs, gone when the process exits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Database file location. `None` selects the in-memory store.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Queue table name. Must not use the reserved `sqlite_` prefix.
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_table(),
        }
    }
}

fn default_table() -> String {
    "crawl_queue".to_string()
}
