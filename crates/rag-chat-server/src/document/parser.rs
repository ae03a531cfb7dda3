use anyhow::{Context, Result};
use lopdf::Document as PdfDocument;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Guess from the file name, falling back to the `%PDF` magic bytes
    pub fn detect(filename: &str, bytes: &[u8]) -> Self {
        let is_pdf_name = filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf_name || bytes.starts_with(b"%PDF") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content: String,
    pub kind: DocumentKind,
    pub pages: Option<usize>,
}

pub struct DocumentParser;

impl DocumentParser {
    /// Extract plain text from an uploaded file held in memory
    pub fn parse_bytes(filename: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let kind = DocumentKind::detect(filename, bytes);
        debug!("Parsing {} ({:?}, {} bytes)", filename, kind, bytes.len());

        match kind {
            DocumentKind::Pdf => Self::parse_pdf(bytes),
            DocumentKind::Text => Ok(ParsedDocument {
                content: String::from_utf8_lossy(bytes).into_owned(),
                kind,
                pages: None,
            }),
        }
    }

    fn parse_pdf(bytes: &[u8]) -> Result<ParsedDocument> {
        let doc = PdfDocument::load_mem(bytes).context("Failed to load PDF file")?;
        let pages = doc.get_pages();
        let page_count = pages.len();

        let mut content = String::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => {
                    content.push_str(&text);
                    content.push('\n');
                }
                Err(e) => {
                    warn!("Failed to extract text from page {}: {}", page_num, e);
                }
            }
        }

        Ok(ParsedDocument {
            content,
            kind: DocumentKind::Pdf,
            pages: Some(page_count),
        })
    }
}
