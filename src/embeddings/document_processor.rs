//! PDF loading.
//!
//! Each page of each PDF becomes one [`Document`] so that retrieved chunks
//! can be traced back to a file and page.

use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    /// Zero-based page index within `source`.
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>, page: u32) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                page,
            },
        }
    }
}

pub struct DocumentProcessor;

impl DocumentProcessor {
    /// Load a single PDF, one document per page.
    pub fn load_pdf(path: &Path) -> AppResult<Vec<Document>> {
        let pdf = lopdf::Document::load(path)?;
        let source = path.display().to_string();

        let mut documents = Vec::new();
        for (index, page_number) in pdf.get_pages().keys().enumerate() {
            match pdf.extract_text(&[*page_number]) {
                Ok(text) => documents.push(Document::new(text, source.clone(), index as u32)),
                Err(e) => {
                    warn!(source = %source, page = *page_number, error = %e, "Skipping unreadable page");
                }
            }
        }

        debug!(source = %source, pages = documents.len(), "Loaded PDF");
        Ok(documents)
    }

    /// Load every `*.pdf` directly inside `dir`, in path order.
    ///
    /// Files that fail to parse are logged and skipped.
    pub fn load_directory(dir: &Path) -> AppResult<Vec<Document>> {
        if !dir.is_dir() {
            return Err(AppError::Config(format!(
                "data directory {} does not exist",
                dir.display()
            )));
        }

        let files = Self::pdf_files(dir)?;
        info!(directory = %dir.display(), files = files.len(), "Loading PDF documents");

        let mut documents = Vec::new();
        for file in &files {
            match Self::load_pdf(file) {
                Ok(pages) => documents.extend(pages),
                Err(e) => warn!(file = %file.display(), error = %e, "Failed to load PDF"),
            }
        }

        info!(documents = documents.len(), "Loaded document pages");
        Ok(documents)
    }

    fn pdf_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
