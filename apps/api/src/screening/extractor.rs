//! Document Text Extractor: turns an uploaded PDF or DOCX into plain text.
//!
//! Format is chosen from the filename extension and cross-checked against the
//! declared MIME type. Content is never sniffed. Extraction fails closed: a
//! document that yields no text is an error, not an empty string.

use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::errors::PipelineError;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Browsers and CLI clients fall back to this when they do not know the type.
const GENERIC_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn mime(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => PDF_MIME,
            DocumentFormat::Docx => DOCX_MIME,
        }
    }

    /// Resolves the format from the filename, then rejects a declared MIME type
    /// that disagrees with it.
    pub fn resolve(filename: &str, content_type: Option<&str>) -> Result<Self, PipelineError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let format = match extension.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "" => {
                return Err(PipelineError::UnsupportedFormat {
                    extension: "(none)".to_string(),
                })
            }
            other => {
                return Err(PipelineError::UnsupportedFormat {
                    extension: other.to_string(),
                })
            }
        };

        if let Some(declared) = content_type {
            let declared = declared
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !declared.is_empty() && declared != GENERIC_MIME && declared != format.mime() {
                return Err(PipelineError::UnsupportedFormat {
                    extension: declared,
                });
            }
        }

        Ok(format)
    }
}

/// Plain text pulled out of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub source_filename: String,
}

/// Extracts plain text from an in-memory document.
pub fn extract_text(
    bytes: &[u8],
    filename: &str,
    content_type: Option<&str>,
) -> Result<ExtractedText, PipelineError> {
    let format = DocumentFormat::resolve(filename, content_type)?;

    let raw = match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
    }
    .map_err(|source| PipelineError::ExtractionFailed {
        filename: filename.to_string(),
        source,
    })?;

    let text = raw.trim();
    if text.is_empty() {
        return Err(PipelineError::ExtractionFailed {
            filename: filename.to_string(),
            source: anyhow!("document contains no extractable text"),
        });
    }

    debug!("Extracted {} chars from {filename} ({format:?})", text.len());
    Ok(ExtractedText {
        text: text.to_string(),
        source_filename: filename.to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// PDF
// ────────────────────────────────────────────────────────────────────────────

fn extract_pdf(bytes: &[u8]) -> anyhow::Result<String> {
    match extract_pdf_pages(bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => {
            debug!("lopdf produced no text, falling back to pdf-extract");
            extract_pdf_whole(bytes)
        }
        Err(e) => {
            warn!("lopdf extraction failed ({e:#}), falling back to pdf-extract");
            extract_pdf_whole(bytes)
        }
    }
}

/// Page-ordered extraction; pages are joined with a single newline.
fn extract_pdf_pages(bytes: &[u8]) -> anyhow::Result<String> {
    let doc = lopdf::Document::load_mem(bytes).context("failed to parse PDF")?;

    let mut pages = Vec::new();
    // get_pages() is a BTreeMap keyed by page number, so iteration is in page order
    for (page_number, _page_id) in doc.get_pages() {
        let text = doc
            .extract_text(&[page_number])
            .with_context(|| format!("failed to extract text from page {page_number}"))?;
        pages.push(text.trim_end().to_string());
    }

    Ok(pages.join("\n"))
}

fn extract_pdf_whole(bytes: &[u8]) -> anyhow::Result<String> {
    // pdf-extract panics on some malformed inputs instead of returning an error
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| anyhow!("PDF parser aborted on malformed input"))?
        .map_err(|e| anyhow!("failed to extract PDF text: {e}"))
}

// ────────────────────────────────────────────────────────────────────────────
// DOCX
// ────────────────────────────────────────────────────────────────────────────

fn extract_docx(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("not a valid DOCX (zip) archive")?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("missing word/document.xml")?
        .read_to_string(&mut xml)
        .context("failed to read word/document.xml")?;

    docx_xml_to_text(&xml)
}

/// Keeps run text, tabs and breaks; every paragraph ends with a newline.
fn docx_xml_to_text(xml: &str) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_node = true;
                }
            }
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_node => {
                let value = e.unescape().context("invalid text in DOCX")?;
                output.push_str(&value);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!(
                "failed to parse DOCX XML at position {}: {e}",
                reader.buffer_position()
            ),
            _ => {}
        }
    }

    Ok(output)
}
