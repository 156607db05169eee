//! Loads the retrieval knowledge base from a directory of text documents.
//!
//! Every `.md` / `.txt` file is split into paragraphs (blank-line separated);
//! each paragraph becomes one retrievable document with id `{file}#{n}`.

use std::path::Path;

use heartline_core::retrieval::{Document, KeywordRetriever};
use heartline_types::error::RepositoryError;

const EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(current.trim().to_string());
            }
            current.clear();
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    paragraphs
}

/// Build a [`KeywordRetriever`] over every document in `dir` (non-recursive).
///
/// Files are read in name order so document ids are stable between runs.
pub async fn load_documents(dir: &Path) -> Result<KeywordRetriever, RepositoryError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RepositoryError::Io(format!("read {}: {e}", dir.display())))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))?
    {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if supported {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for path in &paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RepositoryError::Io(format!("read {}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for (i, paragraph) in split_paragraphs(&content).into_iter().enumerate() {
            documents.push(Document::new(format!("{name}#{i}"), paragraph));
        }
    }

    tracing::info!(
        dir = %dir.display(),
        files = paths.len(),
        documents = documents.len(),
        "Loaded retrieval documents"
    );
    Ok(KeywordRetriever::new(documents))
}
