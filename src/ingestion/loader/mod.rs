
use itertools::Itertools;
use std::path::Path;
use tracing::{debug, warn};

use crate::{RagError, Result};

pub const SUPPORTED_EXTENSION: &str = "pdf";

/// Text of one page of a loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDocument {
    pub text: String,
    /// Path of the originating file, as given to the loader
    pub source: String,
    /// Zero-based page number
    pub page: u32,
}

/// Whether the path has the one document format the loader accepts
#[inline]
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SUPPORTED_EXTENSION))
}

/// Load a PDF file from disk into one document per page with text
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<PageDocument>> {
    if !is_supported(path) {
        return Err(RagError::UnsupportedFormat(path.display().to_string()));
    }

    let data = std::fs::read(path)?;
    load_pdf_bytes(&data, &path.display().to_string())
}

/// Extract per-page text from in-memory PDF bytes
#[inline]
pub fn load_pdf_bytes(data: &[u8], source: &str) -> Result<Vec<PageDocument>> {
    // pdf-extract panics on some malformed fonts
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data));
    let page_texts = match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!("pdf-extract failed for {}: {}, trying lopdf", source, e);
            extract_pages_with_lopdf(data, source)?
        }
        Err(_) => {
            warn!("pdf-extract panicked on {}, trying lopdf", source);
            extract_pages_with_lopdf(data, source)?
        }
    };

    let pages: Vec<PageDocument> = page_texts
        .into_iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let text = clean_page_text(&text);
            (!text.is_empty()).then(|| PageDocument {
                text,
                source: source.to_string(),
                page: index as u32,
            })
        })
        .collect();

    if pages.is_empty() {
        warn!("No extractable text in {}", source);
    } else {
        debug!("Loaded {} pages with text from {}", pages.len(), source);
    }

    Ok(pages)
}

fn extract_pages_with_lopdf(data: &[u8], source: &str) -> Result<Vec<String>> {
    let document = lopdf::Document::load_mem(data)
        .map_err(|e| RagError::Document(format!("Failed to load PDF {}: {}", source, e)))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut texts = Vec::with_capacity(page_numbers.len());

    for page_number in page_numbers {
        match document.extract_text(&[page_number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                debug!(
                    "Could not extract page {} of {}: {}",
                    page_number, source, e
                );
                texts.push(String::new());
            }
        }
    }

    Ok(texts)
}

/// Drop NUL bytes and blank lines, trim each line
fn clean_page_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .join("\n")
}
