use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upload formats that can be turned into plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Txt,
    Pdf,
    Docx,
}

impl FileKind {
    /// Resolve from the MIME type reported by the uploader, falling back to the
    /// file extension. `None` means the upload is not something we index.
    pub fn detect(file_name: &str, mime: Option<&str>) -> Option<Self> {
        match mime.map(|m| m.to_ascii_lowercase()).as_deref() {
            Some("text/plain") => return Some(FileKind::Txt),
            Some("application/pdf") => return Some(FileKind::Pdf),
            Some(DOCX_MIME) => return Some(FileKind::Docx),
            _ => {}
        }

        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "txt" => Some(FileKind::Txt),
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            _ => None,
        }
    }

    /// MIME type guessed from a local path, as a browser would report it.
    pub fn mime_for_path(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" => Some("text/plain"),
            "pdf" => Some("application/pdf"),
            "docx" => Some(DOCX_MIME),
            "doc" => Some("application/msword"),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF parse error: {0}")]
    Pdf(String),
    #[error("DOCX archive error: {0}")]
    Docx(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract plain text from an uploaded file
pub fn extract_text(kind: FileKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        FileKind::Txt => Ok(String::from_utf8_lossy(bytes).into_owned()),
        FileKind::Pdf => {
            let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
                .map_err(|e| ExtractError::Pdf(e.to_string()))?;
            Ok(join_pages(pages))
        }
        FileKind::Docx => extract_docx(bytes),
    }
}

/// Every page that yielded text is followed by a newline; empty pages add nothing.
fn join_pages(pages: Vec<String>) -> String {
    let mut text = String::new();
    for page in pages.iter().filter(|p| !p.is_empty()) {
        text.push_str(page);
        text.push('\n');
    }
    text
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
    Ok(docx_paragraphs(&strip_tables(&xml)).join("\n"))
}

/// Drops every `<w:tbl>` element, nested ones included. Only body-level
/// paragraphs are indexed; table cells are skipped.
fn strip_tables(xml: &str) -> String {
    static TABLE_TAG: OnceLock<Regex> = OnceLock::new();
    let table_tag = TABLE_TAG
        .get_or_init(|| Regex::new(r"<w:tbl(?:\s[^>]*)?>|</w:tbl>").expect("valid regex"));

    let mut out = String::with_capacity(xml.len());
    let mut depth = 0usize;
    let mut kept_from = 0;
    for tag in table_tag.find_iter(xml) {
        if tag.as_str().starts_with("</") {
            if depth == 1 {
                kept_from = tag.end();
            }
            depth = depth.saturating_sub(1);
        } else {
            if depth == 0 {
                out.push_str(&xml[kept_from..tag.start()]);
            }
            depth += 1;
        }
    }
    if depth == 0 {
        out.push_str(&xml[kept_from..]);
    }
    out
}

/// Text of each `<w:p>` paragraph in a WordprocessingML body, in document order.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    static RUN_TEXT: OnceLock<Regex> = OnceLock::new();
    let paragraph = PARAGRAPH.get_or_init(|| {
        Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("valid regex")
    });
    let run_text = RUN_TEXT.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?/>|<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>")
            .expect("valid regex")
    });

    paragraph
        .captures_iter(xml)
        .map(|p| {
            let body = p.get(1).map(|m| m.as_str()).unwrap_or("");
            run_text
                .captures_iter(body)
                .map(|t| match t.get(1) {
                    Some(text) => unescape_xml(text.as_str()),
                    None if t[0].starts_with("<w:tab") => "\t".to_string(),
                    None if t[0].starts_with("<w:br") => "\n".to_string(),
                    None => String::new(),
                })
                .collect::<String>()
        })
        .collect()
}

/// Decodes the predefined entities and numeric character references in one
/// pass, so `&amp;lt;` stays `&lt;`.
fn unescape_xml(text: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let entity = ENTITY.get_or_init(|| {
        Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9A-Fa-f]+);").expect("valid regex")
    });

    entity
        .replace_all(text, |caps: &regex::Captures| {
            let decoded = match &caps[1] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                reference => {
                    let digits = &reference[1..];
                    let hex = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X'));
                    let code = match hex {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => digits.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
