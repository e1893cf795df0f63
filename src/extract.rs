//! Document text extraction (PDF, OOXML, plain text).
//!
//! The extractor reads one source file and returns its text page by page.
//! Pages are joined with `\n` and the whole result is trimmed; a page with no
//! extractable text contributes an empty string instead of failing the
//! document. A document whose joined text is empty is rejected with
//! [`Error::EmptyExtraction`] so nothing downstream is built from it.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, ResourceKind, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Text of one document, ready for chunking.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub source: PathBuf,
    /// Hex SHA-256 of the file bytes.
    pub digest: String,
    pub page_count: usize,
    /// Per-page text joined with `\n`, trimmed. Never empty.
    pub text: String,
}

/// Read `path`, extract its text and normalize it.
///
/// # Errors
///
/// - [`Error::MissingResource`] if `path` is not a readable file.
/// - [`Error::UnsupportedFormat`] for an unknown extension.
/// - [`Error::Extraction`] if the extraction library rejects the bytes.
/// - [`Error::EmptyExtraction`] if no page yields any text.
pub fn load_document(path: &Path) -> Result<ExtractedDocument> {
    if !path.is_file() {
        return Err(Error::MissingResource {
            kind: ResourceKind::Document,
            path: path.to_path_buf(),
        });
    }
    let content_type = content_type_for_path(path)?;
    let bytes = std::fs::read(path)?;

    let pages = extract_pages(&bytes, content_type)?;
    for (i, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            tracing::warn!(page = i + 1, "page yielded no extractable text");
        }
    }
    let text = join_pages(&pages);
    if text.is_empty() {
        return Err(Error::EmptyExtraction {
            source_name: path.display().to_string(),
        });
    }

    tracing::info!(
        path = %path.display(),
        pages = pages.len(),
        chars = text.chars().count(),
        "extracted document text"
    );

    Ok(ExtractedDocument {
        source: path.to_path_buf(),
        digest: sha256_hex(&bytes),
        page_count: pages.len(),
        text,
    })
}

/// Map a file extension to the content type the extractor dispatches on.
pub fn content_type_for_path(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Ok(MIME_PDF),
        Some("docx") => Ok(MIME_DOCX),
        Some("pptx") => Ok(MIME_PPTX),
        Some("xlsx") => Ok(MIME_XLSX),
        Some("txt") | Some("md") | Some("markdown") | None => Ok(MIME_TEXT),
        Some(other) => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

/// Extract text from in-memory bytes and normalize it (pages joined, trimmed).
///
/// Unlike [`load_document`] this does not reject empty results.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String> {
    Ok(join_pages(&extract_pages(bytes, content_type)?))
}

/// Extract text per page (per slide for pptx, per sheet for xlsx).
pub fn extract_pages(bytes: &[u8], content_type: &str) -> Result<Vec<String>> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes).map(|t| vec![t]),
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_TEXT => Ok(vec![String::from_utf8_lossy(bytes).into_owned()]),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

/// Join page texts with newlines and trim the result.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n").trim().to_string()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| Error::Extraction(e.to_string()))
}

fn ooxml_err(e: impl std::fmt::Display) -> Error {
    Error::Extraction(format!("OOXML: {}", e))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= max_bytes {
        return Err(ooxml_err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    if !archive.file_names().any(|n| n == "word/document.xml") {
        return Err(ooxml_err("word/document.xml not found"));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_t_elements(&xml, "")
}

/// Collect the text of every `<*:t>` element (w:t in Word, a:t in DrawingML).
fn extract_t_elements(xml: &[u8], joiner: &str) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        parts.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(parts.join(joiner))
}

fn numbered_entries(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    let slides = numbered_entries(&archive, "ppt/slides/slide");
    let mut pages = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        pages.push(extract_t_elements(&xml, " ")?);
    }
    Ok(pages)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut pages = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        pages.push(extract_xlsx_sheet_cells(&sheet_xml, &shared_strings)?);
    }
    Ok(pages)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>> {
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                } else if in_si && e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        strings.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn extract_xlsx_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String> {
    let mut cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    while cells.len() < XLSX_MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_v = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if cell_is_shared_str {
                    if let Some(text) = s.parse::<usize>().ok().and_then(|i| shared_strings.get(i)) {
                        cells.push(text.clone());
                    }
                } else if !s.is_empty() {
                    cells.push(s.to_string());
                }
                in_v = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_v = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options: zip::write::SimpleFileOptions = Default::default();
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn pages_joined_with_newline_and_trimmed() {
        let pages = vec![
            "  first page".to_string(),
            String::new(),
            "third page \n".to_string(),
        ];
        assert_eq!(join_pages(&pages), "first page\n\nthird page");
    }

    #[test]
    fn all_empty_pages_join_to_empty() {
        let pages = vec![String::new(), "   ".to_string()];
        assert_eq!(join_pages(&pages), "");
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for_path(Path::new("cv.PDF")).unwrap(), MIME_PDF);
        assert_eq!(content_type_for_path(Path::new("notes.md")).unwrap(), MIME_TEXT);
        assert_eq!(content_type_for_path(Path::new("README")).unwrap(), MIME_TEXT);
        assert!(matches!(
            content_type_for_path(Path::new("photo.png")),
            Err(Error::UnsupportedFormat(ext)) if ext == "png"
        ));
    }

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn docx_text_runs_are_collected() {
        let bytes = zip_with(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Hel</w:t></w:r><w:r><w:t>lo docx</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        assert_eq!(extract_text(&bytes, MIME_DOCX).unwrap(), "Hello docx");
    }

    #[test]
    fn pptx_slides_are_pages_in_numeric_order() {
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", r#"<p:sld xmlns:a="a"><a:t>ten</a:t></p:sld>"#),
            ("ppt/slides/slide2.xml", r#"<p:sld xmlns:a="a"><a:t>two</a:t></p:sld>"#),
        ]);
        let pages = extract_pages(&bytes, MIME_PPTX).unwrap();
        assert_eq!(pages, vec!["two".to_string(), "ten".to_string()]);
    }

    #[test]
    fn xlsx_sheets_are_pages_in_numeric_order() {
        let bytes = zip_with(&[
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>Region</t></si><si><t>North region</t></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet10.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1"><v> 42 </v></c><c r="B1"><v></v></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1"><v>3.5</v></c><c r="C1" t="s"><v>9</v></c></row></sheetData></worksheet>"#,
            ),
        ]);
        let pages = extract_pages(&bytes, MIME_XLSX).unwrap();
        assert_eq!(pages, vec!["North region 3.5".to_string(), "42".to_string()]);
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "North region 3.5\n42");
    }

    #[test]
    fn xlsx_without_shared_strings_keeps_values() {
        let bytes = zip_with(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row><c r="A1" t="s"><v>0</v></c><c r="B1"><v>7</v></c></row></sheetData></worksheet>"#,
        )]);
        assert_eq!(extract_pages(&bytes, MIME_XLSX).unwrap(), vec!["7".to_string()]);
    }

    #[test]
    fn plain_text_is_one_page() {
        let pages = extract_pages(b"line one\nline two\n", MIME_TEXT).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(extract_text(b"  line one\n", MIME_TEXT).unwrap(), "line one");
    }

    #[test]
    fn missing_file_is_missing_resource() {
        let err = load_document(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingResource {
                kind: ResourceKind::Document,
                ..
            }
        ));
    }

    #[test]
    fn whitespace_only_file_is_empty_extraction() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, " \n\t\n").unwrap();
        assert!(matches!(
            load_document(&path),
            Err(Error::EmptyExtraction { .. })
        ));
    }

    #[test]
    fn text_file_loads_with_digest() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "abc").unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.text, "abc");
        assert_eq!(doc.page_count, 1);
        assert_eq!(
            doc.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
