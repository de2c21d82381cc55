use crate::extractor::{extract_document_text, is_supported};
use crate::{Document, IngestError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists supported documents directly inside `folder`, sorted by path.
pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedDocument>,
}

/// Loads every supported document in `folder`. Unreadable and blank files are
/// reported in `skipped_files` instead of failing the whole load.
pub fn load_documents(folder: &Path) -> Result<IngestionReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "document folder does not exist: {}",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in discover_documents(folder) {
        match load_document(&path) {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => skipped_files.push(SkippedDocument {
                path,
                reason: "document is empty or contains only whitespace".to_string(),
            }),
            Err(error) => skipped_files.push(SkippedDocument {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(IngestionReport {
        documents,
        skipped_files,
    })
}

fn load_document(path: &Path) -> Result<Option<Document>, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    let text = extract_document_text(path)?;
    if text.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(Document::new(text, name)))
}
