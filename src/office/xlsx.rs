//! Workbook reading and writing.
//!
//! Reading returns the first sheet as a dense grid of strings. Writing
//! produces a package with inline strings and a deduplicated style table,
//! enough for the shift and calendar exports.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{attr, relationships, resolve_target, xml_error, Package};
use crate::error::OfficeError;

// =============================================================================
// Reading
// =============================================================================

/// Reads the first worksheet into rows of cell strings.
///
/// Row `n` of the result is spreadsheet row `n + 1`. Missing cells are empty
/// strings; trailing empty rows are dropped.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, OfficeError> {
    let mut package = Package::open(bytes.to_vec())?;

    let workbook = package.read_part("xl/workbook.xml")?;
    let sheet_rel = first_sheet_rel_id(&workbook)?;

    let rels_xml = package.read_part("xl/_rels/workbook.xml.rels")?;
    let rels = relationships(&rels_xml, "xl/_rels/workbook.xml.rels")?;
    let sheet_path = rels
        .iter()
        .find(|(id, _)| *id == sheet_rel)
        .map(|(_, target)| resolve_target("xl", target))
        .ok_or_else(|| OfficeError::MissingPart(format!("relationship {}", sheet_rel)))?;

    let shared = match package.read_optional_part("xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = package.read_part(&sheet_path)?;
    sheet_rows(&sheet_xml, &sheet_path, &shared)
}

fn first_sheet_rel_id(workbook: &str) -> Result<String, OfficeError> {
    let mut reader = Reader::from_str(workbook);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                // `r:id`; the local name "id" does not clash with `sheetId`.
                return attr(&e, b"id").ok_or(OfficeError::NoSheets);
            }
            Ok(Event::Eof) => return Err(OfficeError::NoSheets),
            Err(e) => return Err(xml_error("xl/workbook.xml", e)),
            _ => {}
        }
    }
}

/// Shared string table. Phonetic runs (`rPh`) are skipped.
fn shared_strings(xml: &str) -> Result<Vec<String>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(t)) if in_text && !in_phonetic => {
                let text = t.unescape().map_err(|e| xml_error("xl/sharedStrings.xml", e))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("xl/sharedStrings.xml", e)),
            _ => {}
        }
    }

    Ok(strings)
}

fn sheet_rows(xml: &str, part: &str, shared: &[String]) -> Result<Vec<Vec<String>>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    let mut row_idx = 0usize;
    let mut next_col = 0usize;
    let mut cell_col = 0usize;
    let mut cell_type = String::new();
    let mut value = String::new();
    let mut in_cell = false;
    let mut capture = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .map(|r| r.saturating_sub(1))
                        .unwrap_or(row_idx);
                    next_col = 0;
                }
                b"c" => {
                    in_cell = true;
                    cell_col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    cell_type = attr(&e, b"t").unwrap_or_default();
                    value.clear();
                }
                b"v" | b"t" if in_cell => capture = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let col = attr(&e, b"r").and_then(|r| column_index(&r)).unwrap_or(next_col);
                next_col = col + 1;
            }
            Ok(Event::Text(t)) if capture => {
                let text = t.unescape().map_err(|e| xml_error(part, e))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    in_cell = false;
                    let resolved = resolve_cell(&cell_type, &value, shared);
                    let row = rows.entry(row_idx).or_default();
                    if row.len() <= cell_col {
                        row.resize(cell_col + 1, String::new());
                    }
                    row[cell_col] = resolved;
                    next_col = cell_col + 1;
                }
                b"row" => {
                    rows.entry(row_idx).or_default();
                    row_idx += 1;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    let height = rows
        .iter()
        .rev()
        .find(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(idx, _)| idx + 1)
        .unwrap_or(0);

    let mut grid = vec![Vec::new(); height];
    for (idx, cells) in rows {
        if idx < height {
            grid[idx] = cells;
        }
    }
    Ok(grid)
}

fn resolve_cell(cell_type: &str, raw: &str, shared: &[String]) -> String {
    match cell_type {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        "b" => if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string(),
        _ => raw.to_string(),
    }
}

/// Zero-based column index of a cell reference such as `AB12`.
pub fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Column letters for a one-based column number.
pub fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

// =============================================================================
// Writing
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Dashed,
    Medium,
}

impl BorderStyle {
    fn as_xml(&self) -> Option<&'static str> {
        match self {
            BorderStyle::None => None,
            BorderStyle::Thin => Some("thin"),
            BorderStyle::Dashed => Some("dashed"),
            BorderStyle::Medium => Some("medium"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Borders {
    pub left: BorderStyle,
    pub right: BorderStyle,
    pub top: BorderStyle,
    pub bottom: BorderStyle,
}

impl Borders {
    pub fn all(style: BorderStyle) -> Self {
        Self {
            left: style,
            right: style,
            top: style,
            bottom: style,
        }
    }
}

/// Formatting of a single cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellStyle {
    pub bold: bool,
    /// Solid fill as `RRGGBB`.
    pub fill: Option<String>,
    pub borders: Borders,
    pub centered: bool,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn centered(mut self) -> Self {
        self.centered = true;
        self
    }

    pub fn with_borders(mut self, borders: Borders) -> Self {
        self.borders = borders;
        self
    }

    /// Sets a solid fill. Accepts `#RRGGBB` or `RRGGBB`; anything else is
    /// ignored.
    pub fn with_fill(mut self, color: &str) -> Self {
        self.fill = normalize_rgb(color);
        self
    }
}

/// Uppercase `RRGGBB` from `#rrggbb`/`rrggbb`.
pub fn normalize_rgb(color: &str) -> Option<String> {
    let hex = color.trim().trim_start_matches('#');
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_uppercase())
}

#[derive(Debug, Clone)]
struct Cell {
    value: String,
    style: CellStyle,
}

/// One sheet of a workbook under construction. Rows and columns are 1-based.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    col_widths: BTreeMap<u32, f64>,
    row_heights: BTreeMap<u32, f64>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            row_heights: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, row: u32, col: u32, value: impl Into<String>, style: CellStyle) {
        self.cells.insert(
            (row, col),
            Cell {
                value: value.into(),
                style,
            },
        );
    }

    pub fn value(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).map(|c| c.value.as_str())
    }

    pub fn style(&self, row: u32, col: u32) -> Option<&CellStyle> {
        self.cells.get(&(row, col)).map(|c| &c.style)
    }

    pub fn set_col_width(&mut self, col: u32, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn col_width(&self, col: u32) -> Option<f64> {
        self.col_widths.get(&col).copied()
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    fn to_xml(&self, styles: &StyleTable) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        if !self.col_widths.is_empty() {
            xml.push_str("<cols>");
            for (col, width) in &self.col_widths {
                xml.push_str(&format!(
                    r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
                    col, width
                ));
            }
            xml.push_str("</cols>");
        }

        let mut rows: BTreeMap<u32, Vec<(u32, &Cell)>> = BTreeMap::new();
        for ((row, col), cell) in &self.cells {
            rows.entry(*row).or_default().push((*col, cell));
        }
        for row in self.row_heights.keys() {
            rows.entry(*row).or_default();
        }

        xml.push_str("<sheetData>");
        for (row, cells) in rows {
            match self.row_heights.get(&row) {
                Some(height) => xml.push_str(&format!(
                    r#"<row r="{}" ht="{}" customHeight="1">"#,
                    row, height
                )),
                None => xml.push_str(&format!(r#"<row r="{}">"#, row)),
            }

            for (col, cell) in cells {
                let reference = format!("{}{}", column_letter(col), row);
                let style = styles.index_of(&cell.style);
                if cell.value.is_empty() {
                    xml.push_str(&format!(r#"<c r="{}" s="{}"/>"#, reference, style));
                } else {
                    xml.push_str(&format!(
                        r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        reference,
                        style,
                        escape(cell.value.as_str())
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }
}

/// Deduplicated fonts, fills, borders and cell formats.
struct StyleTable {
    fills: Vec<String>,
    borders: Vec<Borders>,
    xfs: Vec<CellStyle>,
    index: HashMap<CellStyle, usize>,
}

impl StyleTable {
    fn build<'a>(styles: impl Iterator<Item = &'a CellStyle>) -> Self {
        let mut table = StyleTable {
            fills: Vec::new(),
            borders: vec![Borders::default()],
            xfs: vec![CellStyle::default()],
            index: HashMap::new(),
        };
        table.index.insert(CellStyle::default(), 0);

        for style in styles {
            if table.index.contains_key(style) {
                continue;
            }
            if let Some(fill) = &style.fill {
                if !table.fills.contains(fill) {
                    table.fills.push(fill.clone());
                }
            }
            if !table.borders.contains(&style.borders) {
                table.borders.push(style.borders);
            }
            table.index.insert(style.clone(), table.xfs.len());
            table.xfs.push(style.clone());
        }
        table
    }

    fn index_of(&self, style: &CellStyle) -> usize {
        self.index.get(style).copied().unwrap_or(0)
    }

    fn fill_id(&self, style: &CellStyle) -> usize {
        // 0 and 1 are the reserved none/gray125 fills.
        style
            .fill
            .as_ref()
            .and_then(|f| self.fills.iter().position(|x| x == f))
            .map(|i| i + 2)
            .unwrap_or(0)
    }

    fn border_id(&self, style: &CellStyle) -> usize {
        self.borders
            .iter()
            .position(|b| *b == style.borders)
            .unwrap_or(0)
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font><font><b/><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
        );

        xml.push_str(&format!(
            r#"<fills count="{}"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
            self.fills.len() + 2
        ));
        for fill in &self.fills {
            xml.push_str(&format!(
                r#"<fill><patternFill patternType="solid"><fgColor rgb="FF{0}"/><bgColor rgb="FF{0}"/></patternFill></fill>"#,
                fill
            ));
        }
        xml.push_str("</fills>");

        xml.push_str(&format!(r#"<borders count="{}">"#, self.borders.len()));
        for borders in &self.borders {
            xml.push_str("<border>");
            for (tag, side) in [
                ("left", borders.left),
                ("right", borders.right),
                ("top", borders.top),
                ("bottom", borders.bottom),
            ] {
                match side.as_xml() {
                    Some(style) => xml.push_str(&format!(
                        r#"<{0} style="{1}"><color auto="1"/></{0}>"#,
                        tag, style
                    )),
                    None => xml.push_str(&format!("<{}/>", tag)),
                }
            }
            xml.push_str("<diagonal/></border>");
        }
        xml.push_str("</borders>");

        xml.push_str(
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
        );
        xml.push_str(&format!(r#"<cellXfs count="{}">"#, self.xfs.len()));
        for style in &self.xfs {
            let font_id = usize::from(style.bold);
            let fill_id = self.fill_id(style);
            let border_id = self.border_id(style);
            if style.centered {
                xml.push_str(&format!(
                    r#"<xf numFmtId="0" fontId="{}" fillId="{}" borderId="{}" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>"#,
                    font_id, fill_id, border_id
                ));
            } else {
                xml.push_str(&format!(
                    r#"<xf numFmtId="0" fontId="{}" fillId="{}" borderId="{}" xfId="0" applyFont="1" applyFill="1" applyBorder="1"/>"#,
                    font_id, fill_id, border_id
                ));
            }
        }
        xml.push_str("</cellXfs>");
        xml.push_str(
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#,
        );
        xml
    }
}

/// A workbook under construction.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Worksheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Serializes the workbook into `.xlsx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OfficeError> {
        if self.sheets.is_empty() {
            return Err(OfficeError::NoSheets);
        }

        let styles = StyleTable::build(
            self.sheets
                .iter()
                .flat_map(|s| s.cells.values().map(|c| &c.style)),
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(self.content_types().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(self.workbook_xml().as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(self.workbook_rels().as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(styles.to_xml().as_bytes())?;

        for (idx, sheet) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(sheet.to_xml(&styles).as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn content_types(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );
        for idx in 1..=self.sheets.len() {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                idx
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        for (idx, sheet) in self.sheets.iter().enumerate() {
            xml.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape(sheet.name.as_str()),
                idx + 1,
                idx + 1
            ));
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    fn workbook_rels(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for idx in 1..=self.sheets.len() {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{0}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
                idx
            ));
        }
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            self.sheets.len() + 1
        ));
        xml.push_str("</Relationships>");
        xml
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
