//! Filesystem adapters for Heartline.
//!
//! Data-directory resolution, the JSON file conversation memory and the
//! document loader used by the retrieval advisor.

pub mod documents;
pub mod memory;

use std::path::{Path, PathBuf};

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HEARTLINE_DATA_DIR` environment variable
/// 2. `~/.heartline` in the user's home directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HEARTLINE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".heartline");
    }

    // Last resort: current directory
    PathBuf::from(".heartline")
}

/// Default directory for the file memory backend: `{data_dir}/chat-memory`.
pub fn chat_memory_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("chat-memory")
}
