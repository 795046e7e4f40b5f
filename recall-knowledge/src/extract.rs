//! Plain-text extraction per declared document type.

use std::path::Path;

use recall_db::DocumentType;
use tracing::debug;

use crate::errors::{KnowledgeError, KnowledgeResult};

/// Extract plain text from a file according to its declared type.
pub async fn extract_text(path: &Path, doc_type: DocumentType) -> KnowledgeResult<String> {
    match doc_type {
        DocumentType::Pdf => extract_pdf(path).await,
        DocumentType::Docx => extract_docx(path).await,
        DocumentType::Txt | DocumentType::Md => extract_plain(path).await,
        DocumentType::Unknown => Err(KnowledgeError::UnsupportedType(
            path.extension()
                .and_then(|v| v.to_str())
                .unwrap_or("")
                .to_string(),
        )),
    }
}

async fn extract_plain(path: &Path) -> KnowledgeResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn extract_pdf(path: &Path) -> KnowledgeResult<String> {
    let bytes = tokio::fs::read(path).await?;
    let path_display = path.display().to_string();

    let (text, page_count) = tokio::task::spawn_blocking(move || {
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| KnowledgeError::Extraction(format!("pdf extraction failed: {e}")))?;
        let page_count = lopdf::Document::load_mem(&bytes)
            .map(|doc| doc.get_pages().len())
            .unwrap_or(1);
        Ok::<_, KnowledgeError>((text, page_count))
    })
    .await
    .map_err(|e| KnowledgeError::Extraction(format!("pdf extraction task failed: {e}")))??;

    debug!("Extracted {page_count} pdf pages from {path_display}");

    // pdf-extract leaves stray control chars and blank lines behind.
    let cleaned = text
        .replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(cleaned)
}

async fn extract_docx(path: &Path) -> KnowledgeResult<String> {
    let bytes = tokio::fs::read(path).await?;

    tokio::task::spawn_blocking(move || {
        let doc = docx_rs::read_docx(&bytes)
            .map_err(|e| KnowledgeError::Extraction(format!("docx parsing failed: {e}")))?;

        let mut paragraphs: Vec<String> = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
                let mut line = String::new();
                for child in paragraph.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(text) = child {
                                line.push_str(&text.text);
                            }
                        }
                    }
                }
                if !line.trim().is_empty() {
                    paragraphs.push(line);
                }
            }
        }

        Ok(paragraphs.join("\n\n"))
    })
    .await
    .map_err(|e| KnowledgeError::Extraction(format!("docx extraction task failed: {e}")))?
}
