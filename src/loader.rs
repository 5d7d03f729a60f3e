//! File loading: extension-dispatched text extraction.
//!
//! Turns an uploaded file into a [`Document`]. Only plain text, Markdown,
//! PDF, and Word documents are accepted; anything else is a typed error so
//! a batch can report the file and move on.

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Document;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["txt", "md", "pdf", "docx"];

/// Load a file into a document, dispatching on its extension.
pub fn load_file(path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let content = match extension.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)?,
        "pdf" => extract_pdf(&std::fs::read(path)?, &name)?,
        "docx" => extract_docx(&std::fs::read(path)?, &name)?,
        other => return Err(Error::UnsupportedFileType(other.to_string())),
    };

    Ok(Document::new(name, content))
}

fn extract_pdf(bytes: &[u8], name: &str) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::file_parse(name, e.to_string()))
}

/// Pull the text runs (`w:t` elements) out of `word/document.xml`.
fn extract_docx(bytes: &[u8], name: &str) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::file_parse(name, e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| Error::file_parse(name, "word/document.xml not found"))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| Error::file_parse(name, e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(Error::file_parse(
                name,
                "word/document.xml exceeds size limit",
            ));
        }
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let local = e.local_name();
                if local.as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                } else if local.as_ref() == b"p" && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::file_parse(name, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
