//! XLSX style recovery: fill and font colours from styles.xml, per-cell style
//! IDs and custom column widths from worksheet XML.
//!
//! calamine reads values only, so a destination workbook would lose every
//! highlight on the next save without this pass.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use capsync_engine::cell::{CellStyle, Rgb};
use zip::ZipArchive;

// =============================================================================
// Public types
// =============================================================================

/// Parsed style table from styles.xml: maps cellXfs index → CellStyle.
#[derive(Debug, Default)]
pub struct StyleTable {
    pub styles: Vec<CellStyle>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-cell style references extracted from a worksheet XML.
#[derive(Debug, Default)]
pub struct SheetFormatting {
    /// 1-based (row, col, style_id) triples
    pub cell_styles: Vec<(usize, usize, usize)>,
    /// 1-based column → raw Excel character-width units
    pub col_widths: HashMap<usize, f64>,
}

// =============================================================================
// Colour parsing
// =============================================================================

/// The first eight legacy palette entries; anything else is left unresolved.
fn indexed_color(idx: u8) -> Option<Rgb> {
    let rgb = match idx {
        0 | 8 => 0x000000,
        1 | 9 => 0xffffff,
        2 | 10 => 0xff0000,
        3 | 11 => 0x00ff00,
        4 | 12 => 0x0000ff,
        5 | 13 => 0xffff00,
        6 | 14 => 0xff00ff,
        7 | 15 => 0x00ffff,
        _ => return None,
    };
    Some(Rgb(rgb))
}

/// Resolve a <color>/<fgColor> element. Theme colours are not resolved.
fn parse_color_attrs(attrs: &[(Vec<u8>, Vec<u8>)]) -> Option<Rgb> {
    let mut rgb_val: Option<&[u8]> = None;
    let mut indexed_val: Option<u8> = None;

    for (key, value) in attrs {
        match key.as_slice() {
            b"rgb" => rgb_val = Some(value.as_slice()),
            b"indexed" => {
                indexed_val = std::str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse().ok());
            }
            _ => {}
        }
    }

    if let Some(hex) = rgb_val {
        return std::str::from_utf8(hex).ok().and_then(Rgb::from_hex);
    }
    indexed_val.and_then(indexed_color)
}

// =============================================================================
// styles.xml parser
// =============================================================================

#[derive(Debug, Default)]
struct XfEntry {
    font_id: Option<usize>,
    fill_id: Option<usize>,
}

/// Parse styles.xml content into a StyleTable.
pub fn parse_styles_xml(xml: &str) -> StyleTable {
    let fonts = parse_fonts(xml);
    let fills = parse_fills(xml);
    let styles = parse_cell_xfs(xml)
        .into_iter()
        .map(|xf| CellStyle {
            fill: xf.fill_id.and_then(|id| fills.get(id).copied().flatten()),
            font_color: xf.font_id.and_then(|id| fonts.get(id).copied().flatten()),
        })
        .collect();

    StyleTable { styles }
}

/// Parse <fonts> into one optional colour per font entry.
fn parse_fonts(xml: &str) -> Vec<Option<Rgb>> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fonts>, 2 = inside <font>
    let mut current: Option<Rgb> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = None;
                }
                b"color" if depth == 2 => current = parse_color_attrs(&collect_attrs(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"color" if depth == 2 => current = parse_color_attrs(&collect_attrs(e)),
                b"font" if depth == 1 => fonts.push(None),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(current);
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// Parse <fills> into one optional solid colour per fill entry.
fn parse_fills(xml: &str) -> Vec<Option<Rgb>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fills>, 2 = inside <fill>
    let mut in_pattern_fill = false;
    let mut current: Option<Rgb> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = None;
                }
                b"patternFill" if depth == 2 => in_pattern_fill = true,
                b"fgColor" if in_pattern_fill => current = parse_color_attrs(&collect_attrs(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"fgColor" && in_pattern_fill {
                    current = parse_color_attrs(&collect_attrs(e));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"patternFill" => in_pattern_fill = false,
                b"fill" if depth == 2 => {
                    fills.push(current);
                    depth = 1;
                    in_pattern_fill = false;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

/// Parse the <cellXfs> section (not <cellStyleXfs>).
fn parse_cell_xfs(xml: &str) -> Vec<XfEntry> {
    let mut entries = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"cellXfs" => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if in_cell_xfs && e.name().as_ref() == b"xf" =>
            {
                let mut entry = XfEntry::default();
                for attr in e.attributes().flatten() {
                    let parsed = std::str::from_utf8(&attr.value)
                        .ok()
                        .and_then(|s| s.parse().ok());
                    match attr.key.as_ref() {
                        b"fontId" => entry.font_id = parsed,
                        b"fillId" => entry.fill_id = parsed,
                        _ => {}
                    }
                }
                entries.push(entry);
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    entries
}

// =============================================================================
// Worksheet XML parser: per-cell style IDs + column widths
// =============================================================================

pub fn parse_sheet_formatting(xml: &str) -> SheetFormatting {
    let mut formatting = SheetFormatting::default();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"c" => {
                    let mut style_id: Option<usize> = None;
                    let mut cell_ref: Option<String> = None;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"s" => {
                                style_id = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(|s| s.parse().ok());
                            }
                            b"r" => {
                                cell_ref = Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                            _ => {}
                        }
                    }

                    // style_id 0 = default, skip
                    if let (Some(style_id), Some(cell_ref)) = (style_id, cell_ref) {
                        if style_id > 0 {
                            if let Some((row, col)) = parse_cell_ref(&cell_ref) {
                                formatting.cell_styles.push((row, col, style_id));
                            }
                        }
                    }
                }
                b"col" => {
                    let mut min_col: Option<usize> = None;
                    let mut max_col: Option<usize> = None;
                    let mut width: Option<f64> = None;
                    let mut custom_width = false;

                    for attr in e.attributes().flatten() {
                        let text = std::str::from_utf8(&attr.value).ok();
                        match attr.key.as_ref() {
                            b"min" => min_col = text.and_then(|s| s.parse().ok()),
                            b"max" => max_col = text.and_then(|s| s.parse().ok()),
                            b"width" => width = text.and_then(|s| s.parse().ok()),
                            b"customWidth" => {
                                custom_width = attr.value.as_ref() == b"1"
                                    || attr.value.as_ref() == b"true";
                            }
                            _ => {}
                        }
                    }

                    if custom_width {
                        if let (Some(min), Some(max), Some(w)) = (min_col, max_col, width) {
                            for col in min..=max {
                                formatting.col_widths.insert(col, w);
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    formatting
}

/// Parse a cell reference like "B5" into 1-based (row, col) = (5, 2).
fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (col_part, row_part) = r.split_at(split);
    if col_part.is_empty() || !col_part.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = col_part.chars().fold(0usize, |acc, ch| {
        acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1)
    });
    let row: usize = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row, col))
}

// =============================================================================
// Top-level entry point
// =============================================================================

/// Parse all formatting data from an XLSX file.
/// `sheet_names` must match the order of sheets in the workbook; the returned
/// vector is aligned with it.
pub fn parse_xlsx_formatting(
    path: &Path,
    sheet_names: &[String],
) -> Result<(StyleTable, Vec<SheetFormatting>), String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open XLSX file for styles: {}", e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("Failed to read XLSX as ZIP for styles: {}", e))?;

    let style_table = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_styles_xml(&xml),
        Err(_) => StyleTable::default(),
    };

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let worksheet_paths = resolve_worksheet_paths_for_sheets(&workbook_xml, &rels_xml, sheet_names);

    let sheet_formats = worksheet_paths
        .iter()
        .map(|ws_path| match read_zip_file(&mut archive, ws_path) {
            Ok(xml) => parse_sheet_formatting(&xml),
            Err(_) => SheetFormatting::default(),
        })
        .collect();

    Ok((style_table, sheet_formats))
}

// =============================================================================
// Helpers
// =============================================================================

fn collect_attrs(e: &BytesStart) -> Vec<(Vec<u8>, Vec<u8>)> {
    e.attributes()
        .flatten()
        .map(|a| (a.key.as_ref().to_vec(), a.value.to_vec()))
        .collect()
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Resolve worksheet XML paths for specific sheet names (in order).
fn resolve_worksheet_paths_for_sheets(
    workbook_xml: &str,
    rels_xml: &str,
    sheet_names: &[String],
) -> Vec<String> {
    // workbook.xml: sheet name → rId
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"r:id" => rid = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    name_to_rid.insert(name, rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // workbook.xml.rels: rId → target
    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            name_to_rid
                .get(name)
                .and_then(|rid| rid_to_target.get(rid))
                .map(|target| match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                })
                .unwrap_or_default()
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
