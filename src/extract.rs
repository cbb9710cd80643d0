//! Format-specific text extraction producing location-tagged [`TextUnit`]s.
//!
//! Each extractor turns raw file bytes into a sequence of
//! `(text, locator)` units whose granularity matches how people cite the
//! format: pages for PDF, slides for PPTX, sheet rows for XLSX,
//! paragraph ranges for DOCX, line ranges for plain text. A generic
//! "page N" label would be wrong for spreadsheets and decks; the
//! per-format locator is what makes downstream citations accurate.
//!
//! Extraction never panics on malformed input; errors are returned and
//! the orchestrator marks the file failed without touching other files.

use std::io::Read;
use tracing::warn;

use crate::config::ExtractionConfig;
use crate::models::{FileType, Locator, TextUnit};

/// Paragraphs grouped per DOCX unit (no native page concept).
const DOCX_PARAS_PER_UNIT: usize = 10;
/// Lines grouped per TXT/MD unit.
const TEXT_LINES_PER_UNIT: usize = 40;
/// Maximum sheets processed per workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells processed per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Extract location-tagged units from file bytes.
pub fn extract(
    file_id: &str,
    file_type: FileType,
    bytes: &[u8],
    limits: &ExtractionConfig,
) -> Result<Vec<TextUnit>, ExtractError> {
    match file_type {
        FileType::Pdf => extract_pdf(file_id, bytes, limits.max_pdf_pages),
        FileType::Docx => extract_docx(file_id, bytes),
        FileType::Pptx => extract_pptx(file_id, bytes),
        FileType::Xlsx => extract_xlsx(file_id, bytes),
        FileType::Txt | FileType::Md => extract_text(file_id, bytes),
    }
}

// ============ PDF ============

fn extract_pdf(file_id: &str, bytes: &[u8], max_pages: usize) -> Result<Vec<TextUnit>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    if pages.len() > max_pages {
        warn!(
            file_id,
            total_pages = pages.len(),
            dropped = pages.len() - max_pages,
            "PDF exceeds the page cap; indexing the first pages only"
        );
    }

    let mut units = Vec::new();
    for (i, page_text) in pages.iter().take(max_pages).enumerate() {
        if page_text.trim().is_empty() {
            continue;
        }
        units.push(TextUnit {
            source_file_id: file_id.to_string(),
            locator: Locator::Page {
                page: (i + 1) as u32,
            },
            text: page_text.trim().to_string(),
        });
    }
    Ok(units)
}

// ============ Shared ZIP helpers ============

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// List archive entries matching `prefix`/N`.xml`, sorted by N.
fn numbered_entries(
    archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>,
    prefix: &str,
) -> Vec<(u32, String)> {
    let mut names: Vec<(u32, String)> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .filter_map(|n| {
            n.trim_start_matches(prefix)
                .trim_end_matches(".xml")
                .parse::<u32>()
                .ok()
                .map(|num| (num, n.to_string()))
        })
        .collect();
    names.sort_by_key(|(num, _)| *num);
    names
}

// ============ DOCX ============

/// One logical paragraph per `w:p`, with table rows serialized as a
/// single `cell | cell | cell` paragraph so row context survives.
fn extract_docx(file_id: &str, bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = docx_paragraphs(&doc_xml)?;

    let mut units = Vec::new();
    for (i, group) in paragraphs.chunks(DOCX_PARAS_PER_UNIT).enumerate() {
        let text = group.join("\n\n");
        if text.trim().is_empty() {
            continue;
        }
        let start = (i * DOCX_PARAS_PER_UNIT + 1) as u32;
        let end = (i * DOCX_PARAS_PER_UNIT + group.len()) as u32;
        units.push(TextUnit {
            source_file_id: file_id.to_string(),
            locator: Locator::Paragraphs { start, end },
            text,
        });
    }
    Ok(units)
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current_para = String::new();
    let mut in_text = false;
    // Table state: cells of the current row, collapsed to one paragraph
    // on row end.
    let mut in_row = false;
    let mut row_cells: Vec<String> = Vec::new();
    let mut current_cell = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tr" => {
                    in_row = true;
                    row_cells.clear();
                }
                b"tc" => current_cell.clear(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().unwrap_or_default();
                if in_row {
                    current_cell.push_str(&text);
                } else {
                    current_para.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if !in_row => {
                    let trimmed = current_para.trim();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed.to_string());
                    }
                    current_para.clear();
                }
                b"tc" => {
                    let trimmed = current_cell.trim();
                    if !trimmed.is_empty() {
                        row_cells.push(trimmed.to_string());
                    }
                    current_cell.clear();
                }
                b"tr" => {
                    if !row_cells.is_empty() {
                        paragraphs.push(row_cells.join(" | "));
                    }
                    in_row = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

// ============ PPTX ============

/// One unit per slide, concatenating all text frames in slide order.
fn extract_pptx(file_id: &str, bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_entries(&archive, "ppt/slides/slide");

    let mut units = Vec::new();
    for (slide_num, entry_name) in slides {
        let xml = read_zip_entry_bounded(&mut archive, &entry_name, MAX_XML_ENTRY_BYTES)?;
        let text = pptx_slide_text(&xml)?;
        if text.trim().is_empty() {
            continue;
        }
        units.push(TextUnit {
            source_file_id: file_id.to_string(),
            locator: Locator::Slide { slide: slide_num },
            text,
        });
    }
    Ok(units)
}

fn pptx_slide_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ============ XLSX ============

/// One unit per non-empty data row, serialized against the sheet's
/// header row as `"<header>: <value>, ..."`. The header row itself is
/// never emitted; the locator carries the sheet name and the native
/// (1-based) row number so citations match what users see in Excel.
fn extract_xlsx(file_id: &str, bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_display_names = read_workbook_sheet_names(&mut archive)?;
    let worksheets = numbered_entries(&archive, "xl/worksheets/sheet");

    let mut units = Vec::new();
    for (idx, (_, entry_name)) in worksheets.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_name = sheet_display_names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", idx + 1));
        let xml = read_zip_entry_bounded(&mut archive, &entry_name, MAX_XML_ENTRY_BYTES)?;
        let rows = xlsx_sheet_rows(&xml, &shared_strings)?;
        units.extend(sheet_rows_to_units(file_id, &sheet_name, &rows));
    }
    Ok(units)
}

/// A parsed sheet row: native row number plus `(column index, value)`
/// pairs for non-empty cells.
struct SheetRow {
    row_num: u32,
    cells: Vec<(usize, String)>,
}

fn sheet_rows_to_units(file_id: &str, sheet_name: &str, rows: &[SheetRow]) -> Vec<TextUnit> {
    let mut iter = rows.iter().filter(|r| !r.cells.is_empty());

    // First non-empty row is the header; it is consumed, never emitted.
    let header_row = match iter.next() {
        Some(row) => row,
        None => return Vec::new(),
    };
    let max_col = header_row.cells.iter().map(|(c, _)| *c).max().unwrap_or(0);
    let mut headers: Vec<Option<String>> = vec![None; max_col + 1];
    for (col, value) in &header_row.cells {
        headers[*col] = Some(value.clone());
    }

    iter.map(|row| {
        let fields: Vec<String> = row
            .cells
            .iter()
            .map(|(col, value)| {
                match headers.get(*col).and_then(|h| h.as_deref()) {
                    Some(header) => format!("{}: {}", header, value),
                    // Data past the header width keeps its column letter
                    // so the value is not silently dropped.
                    None => format!("{}: {}", column_letters(*col), value),
                }
            })
            .collect();
        TextUnit {
            source_file_id: file_id.to_string(),
            locator: Locator::SheetRow {
                sheet: sheet_name.to_string(),
                row: row.row_num,
            },
            text: fields.join(", "),
        }
    })
    .collect()
}

fn xlsx_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<SheetRow>, ExtractError> {
    use quick_xml::events::Event;

    let mut rows: Vec<SheetRow> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut current_row: Option<SheetRow> = None;
    let mut cell_col: usize = 0;
    let mut cell_type = CellType::Number;
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let row_num = attr_value(&e, b"r")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(rows.len() as u32 + 1);
                    current_row = Some(SheetRow {
                        row_num,
                        cells: Vec::new(),
                    });
                }
                b"c" => {
                    cell_col = attr_value(&e, b"r")
                        .map(|r| column_index(&r))
                        .unwrap_or_else(|| {
                            current_row.as_ref().map(|r| r.cells.len()).unwrap_or(0)
                        });
                    cell_type = match attr_value(&e, b"t").as_deref() {
                        Some("s") => CellType::SharedString,
                        Some("inlineStr") => CellType::Inline,
                        Some("b") => CellType::Boolean,
                        _ => CellType::Number,
                    };
                }
                b"v" | b"t" if current_row.is_some() => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                let value = match cell_type {
                    CellType::SharedString => raw
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i).cloned())
                        .unwrap_or_default(),
                    CellType::Boolean => {
                        if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()
                    }
                    CellType::Inline | CellType::Number => raw.trim().to_string(),
                };
                if !value.is_empty() {
                    if let Some(row) = current_row.as_mut() {
                        row.cells.push((cell_col, value));
                        cell_count += 1;
                    }
                }
                in_value = false;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"row" => {
                    if let Some(row) = current_row.take() {
                        // Empty rows are skipped.
                        if !row.cells.is_empty() {
                            rows.push(row);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

enum CellType {
    SharedString,
    Inline,
    Boolean,
    Number,
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == key {
            String::from_utf8(a.value.into_owned()).ok()
        } else {
            None
        }
    })
}

/// Convert a cell reference like `B7` to a zero-based column index.
fn column_index(cell_ref: &str) -> usize {
    let mut col = 0usize;
    for c in cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()) {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    col.saturating_sub(1)
}

/// Inverse of [`column_index`], for cells past the header width.
fn column_letters(mut col: usize) -> String {
    let mut out = String::new();
    col += 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        out.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    out
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    // Workbooks with no string cells have no sharedStrings part.
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_text = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_text = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    strings.push(current.clone());
                    in_si = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Sheet display names from `xl/workbook.xml`, in declaration order
/// (which matches the numbered worksheet entries for files written by
/// mainstream producers).
fn read_workbook_sheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    if !archive.file_names().any(|n| n == "xl/workbook.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;

    let mut names = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    if let Some(name) = attr_value(&e, b"name") {
                        names.push(name);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

// ============ TXT / MD ============

fn extract_text(file_id: &str, bytes: &[u8]) -> Result<Vec<TextUnit>, ExtractError> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();

    let mut units = Vec::new();
    for (i, group) in lines.chunks(TEXT_LINES_PER_UNIT).enumerate() {
        let unit_text = group.join("\n");
        if unit_text.trim().is_empty() {
            continue;
        }
        let start = (i * TEXT_LINES_PER_UNIT + 1) as u32;
        let end = (i * TEXT_LINES_PER_UNIT + group.len()) as u32;
        units.push(TextUnit {
            source_file_id: file_id.to_string(),
            locator: Locator::Lines { start, end },
            text: unit_text,
        });
    }
    Ok(units)
}
