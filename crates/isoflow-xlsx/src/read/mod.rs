//! Load an `.xlsx` package into an [`isoflow_model::Workbook`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use isoflow_model::{
    normalize_formula_text, Cell, CellContent, CellRef, CellValue, Range, RichText,
    SheetAutoFilter, Workbook, Worksheet,
};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

use crate::formula_shift::shift_formula;
use crate::shared_strings::{parse_shared_strings_xml, parse_si, parse_xml_bool, read_text};
use crate::styles::StylesPart;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] AttrError),
    #[error("xml error: {0}")]
    XmlDom(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed part: {0}")]
    Malformed(&'static str),
    #[error("missing required part: {0}")]
    MissingPart(&'static str),
    #[error("invalid cell reference: {0}")]
    InvalidCellRef(String),
}

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

pub fn read_workbook(path: impl AsRef<Path>) -> Result<Workbook, ReadError> {
    let file = File::open(path)?;
    read_workbook_from_reader(file)
}

pub fn read_workbook_from_bytes(bytes: &[u8]) -> Result<Workbook, ReadError> {
    read_workbook_from_reader(Cursor::new(bytes))
}

pub fn read_workbook_from_reader<R: Read + Seek>(reader: R) -> Result<Workbook, ReadError> {
    let mut archive = ZipArchive::new(reader)?;

    let workbook_xml = read_zip_part_required(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_zip_part_required(&mut archive, WORKBOOK_RELS_PART)?;
    let targets = parse_relationships(std::str::from_utf8(&rels_xml)?)?;
    let info = parse_workbook_xml(std::str::from_utf8(&workbook_xml)?)?;

    let mut workbook = Workbook::new();

    let styles_part = match read_zip_part_optional(&mut archive, STYLES_PART)? {
        Some(bytes) => StylesPart::parse(std::str::from_utf8(&bytes)?, &mut workbook.styles)?,
        None => StylesPart::default(),
    };
    let shared_strings = match read_zip_part_optional(&mut archive, SHARED_STRINGS_PART)? {
        Some(bytes) => parse_shared_strings_xml(&bytes)?,
        None => Vec::new(),
    };

    for (index, sheet) in info.sheets.iter().enumerate() {
        let id = workbook.add_sheet(sheet.name.clone());
        if index == info.active_tab {
            workbook.active_sheet = Some(id);
        }
        let Some(target) = targets.get(&sheet.rel_id) else {
            log::warn!("sheet '{}' has no relationship target; left empty", sheet.name);
            continue;
        };
        let Some(xml) = read_zip_part_optional(&mut archive, target)? else {
            log::warn!("sheet '{}' part {target} is missing; left empty", sheet.name);
            continue;
        };
        if let Some(worksheet) = workbook.sheet_mut(id) {
            parse_worksheet(worksheet, &xml, &shared_strings, &styles_part)?;
        }
    }

    if workbook.active_sheet.is_none() {
        workbook.active_sheet = workbook.sheets.first().map(|s| s.id);
    }

    Ok(workbook)
}

fn read_zip_part_required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Vec<u8>, ReadError> {
    read_zip_part_optional(archive, name)?.ok_or(ReadError::MissingPart(name))
}

fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ReadError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            if file.is_dir() {
                return Ok(None);
            }
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Relationship id -> package part name.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ReadError> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut targets = HashMap::new();
    for rel in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
    {
        let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) else {
            continue;
        };
        targets.insert(id.to_string(), resolve_target(target));
    }
    Ok(targets)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

struct SheetEntry {
    name: String,
    rel_id: String,
}

struct WorkbookInfo {
    sheets: Vec<SheetEntry>,
    active_tab: usize,
}

fn parse_workbook_xml(xml: &str) -> Result<WorkbookInfo, ReadError> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut sheets = Vec::new();
    let mut active_tab = 0;

    for node in doc.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "sheet" => {
                let name = node.attribute("name").unwrap_or_default().to_string();
                // `r:id`; the prefix varies between producers.
                let rel_id = node
                    .attributes()
                    .find(|a| a.name() == "id")
                    .map(|a| a.value().to_string())
                    .unwrap_or_default();
                sheets.push(SheetEntry { name, rel_id });
            }
            "workbookView" => {
                active_tab = node
                    .attribute("activeTab")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }
            _ => {}
        }
    }

    Ok(WorkbookInfo { sheets, active_tab })
}

#[derive(Default)]
struct FormulaMeta {
    t: Option<String>,
    reference: Option<String>,
    shared_index: Option<u32>,
    text: String,
}

struct SharedFollower {
    cell: CellRef,
    shared_index: u32,
}

fn parse_worksheet(
    worksheet: &mut Worksheet,
    xml: &[u8],
    shared_strings: &[RichText],
    styles_part: &StylesPart,
) -> Result<(), ReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut current_row: u32 = 0;
    let mut next_col: u32 = 0;
    let mut shared_anchors: HashMap<u32, (CellRef, String)> = HashMap::new();
    let mut followers: Vec<SharedFollower> = Vec::new();
    let mut filter_column: Option<(u32, Vec<String>)> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let self_closing = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheetView" => {
                worksheet.tab_selected = attr(&e, b"tabSelected")?
                    .as_deref()
                    .is_some_and(parse_xml_bool);
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"col" => {
                let min = attr(&e, b"min")?.and_then(|v| v.parse::<u32>().ok());
                let max = attr(&e, b"max")?.and_then(|v| v.parse::<u32>().ok());
                let width = attr(&e, b"width")?.and_then(|v| v.parse::<f32>().ok());
                let (Some(min), Some(width)) = (min, width) else {
                    continue;
                };
                let max = max
                    .unwrap_or(min)
                    .min(isoflow_model::EXCEL_MAX_COLS);
                for col_1_based in min.max(1)..=max {
                    worksheet.set_col_width(col_1_based - 1, Some(width));
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                if let Some(r) = attr(&e, b"r")?.and_then(|v| v.parse::<u32>().ok()) {
                    current_row = r.saturating_sub(1);
                }
                next_col = 0;
                let custom_height = attr(&e, b"customHeight")?
                    .as_deref()
                    .map_or(true, parse_xml_bool);
                if let Some(ht) = attr(&e, b"ht")?.and_then(|v| v.parse::<f32>().ok()) {
                    if custom_height {
                        worksheet.set_row_height(current_row, Some(ht));
                    }
                }
                if attr(&e, b"hidden")?.as_deref().is_some_and(parse_xml_bool) {
                    worksheet.set_row_hidden(current_row, true);
                }
                // `<row/>` has no matching end event.
                if self_closing {
                    current_row += 1;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                current_row += 1;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (cell_ref, t, style_id) =
                    cell_attrs(&e, current_row, next_col, styles_part)?;
                next_col = cell_ref.col + 1;
                let parsed = parse_cell_body(&mut reader)?;
                let content = interpret_cell(t.as_deref(), &parsed, shared_strings)?;

                if let Some(formula) = &parsed.formula {
                    if formula.t.as_deref() == Some("shared") {
                        if let Some(si) = formula.shared_index {
                            if formula.text.is_empty() {
                                followers.push(SharedFollower {
                                    cell: cell_ref,
                                    shared_index: si,
                                });
                            } else if formula.reference.is_some() {
                                shared_anchors.insert(si, (cell_ref, formula.text.clone()));
                            }
                        }
                    }
                }

                worksheet.set_cell(cell_ref, Cell { content, style_id });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (cell_ref, _, style_id) = cell_attrs(&e, current_row, next_col, styles_part)?;
                next_col = cell_ref.col + 1;
                worksheet.set_style_id(cell_ref, style_id);
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                if let Some(reference) = attr(&e, b"ref")? {
                    let range = Range::from_a1(&reference)
                        .map_err(|_| ReadError::InvalidCellRef(reference.clone()))?;
                    worksheet.merge(range);
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"autoFilter" => {
                if let Some(reference) = attr(&e, b"ref")? {
                    let range = Range::from_a1(&reference)
                        .map_err(|_| ReadError::InvalidCellRef(reference.clone()))?;
                    worksheet.auto_filter = Some(SheetAutoFilter::new(range));
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"filterColumn" => {
                let col_id = attr(&e, b"colId")?
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0);
                if self_closing {
                    if let Some(filter) = worksheet.auto_filter.as_mut() {
                        filter.add_filter_column(col_id, Vec::new());
                    }
                } else {
                    filter_column = Some((col_id, Vec::new()));
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"filter" => {
                if let (Some((_, values)), Some(val)) = (filter_column.as_mut(), attr(&e, b"val")?)
                {
                    values.push(val);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"filterColumn" => {
                if let (Some((col_id, values)), Some(filter)) =
                    (filter_column.take(), worksheet.auto_filter.as_mut())
                {
                    filter.add_filter_column(col_id, values);
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sortCondition" => {
                let descending = attr(&e, b"descending")?
                    .as_deref()
                    .is_some_and(parse_xml_bool);
                if let (Some(reference), Some(filter)) =
                    (attr(&e, b"ref")?, worksheet.auto_filter.as_mut())
                {
                    let range = Range::from_a1(&reference)
                        .map_err(|_| ReadError::InvalidCellRef(reference.clone()))?;
                    filter.add_sort_condition(range, descending);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    expand_shared_formulas(worksheet, &shared_anchors, &followers);
    Ok(())
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReadError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn cell_attrs(
    e: &BytesStart<'_>,
    current_row: u32,
    next_col: u32,
    styles_part: &StylesPart,
) -> Result<(CellRef, Option<String>, u32), ReadError> {
    let cell_ref = match attr(e, b"r")? {
        Some(r) => CellRef::from_a1(&r).map_err(|_| ReadError::InvalidCellRef(r))?,
        None => CellRef::new(current_row, next_col),
    };
    let t = attr(e, b"t")?;
    let style_id = attr(e, b"s")?
        .and_then(|v| v.parse::<u32>().ok())
        .map_or(0, |xf| styles_part.style_id_for_xf(xf));
    Ok((cell_ref, t, style_id))
}

#[derive(Default)]
struct ParsedCell {
    formula: Option<FormulaMeta>,
    value_text: Option<String>,
    inline: Option<RichText>,
}

fn parse_cell_body(reader: &mut Reader<&[u8]>) -> Result<ParsedCell, ReadError> {
    let mut buf = Vec::new();
    let mut parsed = ParsedCell::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"f" => {
                let mut formula = formula_meta(&e)?;
                formula.text = read_text(reader, b"f")?;
                parsed.formula = Some(formula);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"f" => {
                parsed.formula = Some(formula_meta(&e)?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"v" => {
                parsed.value_text = Some(read_text(reader, b"v")?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"is" => {
                parsed.inline = Some(parse_si(reader)?);
            }
            Event::Start(e) => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"c" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <c>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(parsed)
}

fn formula_meta(e: &BytesStart<'_>) -> Result<FormulaMeta, ReadError> {
    Ok(FormulaMeta {
        t: attr(e, b"t")?,
        reference: attr(e, b"ref")?,
        shared_index: attr(e, b"si")?.and_then(|v| v.parse().ok()),
        text: String::new(),
    })
}

fn interpret_cell(
    t: Option<&str>,
    parsed: &ParsedCell,
    shared_strings: &[RichText],
) -> Result<CellContent, ReadError> {
    let v = parsed.value_text.as_deref();

    // Rich strings only survive on non-formula cells.
    let mut rich: Option<RichText> = None;
    let value = match t {
        Some("s") => {
            let Some(v) = v else {
                return Ok(CellContent::default());
            };
            let idx: usize = v
                .trim()
                .parse()
                .map_err(|_| ReadError::Malformed("non-numeric shared string index"))?;
            let item = shared_strings
                .get(idx)
                .ok_or(ReadError::Malformed("shared string index out of range"))?;
            if !item.is_plain() {
                rich = Some(item.clone());
            }
            CellValue::String(item.text.clone())
        }
        Some("inlineStr") => match &parsed.inline {
            Some(item) => {
                if !item.is_plain() {
                    rich = Some(item.clone());
                }
                CellValue::String(item.text.clone())
            }
            None => v.map_or(CellValue::Empty, |v| CellValue::String(v.to_string())),
        },
        Some("str") => v.map_or(CellValue::Empty, |v| CellValue::String(v.to_string())),
        Some("b") => v.map_or(CellValue::Empty, |v| CellValue::Boolean(parse_xml_bool(v.trim()))),
        Some("e") => v.map_or(CellValue::Empty, |v| CellValue::Error(v.to_string())),
        _ => match v {
            None => CellValue::Empty,
            Some(v) => match v.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::String(v.to_string()),
            },
        },
    };

    if let Some(formula) = &parsed.formula {
        let cached = (!value.is_empty()).then_some(value);
        if !formula.text.trim().is_empty() {
            return Ok(CellContent::Formula {
                text: normalize_formula_text(&formula.text),
                cached,
            });
        }
        // Shared-formula follower: the text is filled in after the sheet is read.
        return Ok(CellContent::Literal {
            value: cached.unwrap_or_default(),
        });
    }

    Ok(match rich {
        Some(text) => CellContent::RichText { text },
        None => CellContent::Literal { value },
    })
}

fn expand_shared_formulas(
    worksheet: &mut Worksheet,
    anchors: &HashMap<u32, (CellRef, String)>,
    followers: &[SharedFollower],
) {
    for follower in followers {
        let Some((anchor, text)) = anchors.get(&follower.shared_index) else {
            log::debug!(
                "shared formula {} has no anchor; {} keeps its cached value",
                follower.shared_index,
                follower.cell
            );
            continue;
        };
        let d_row = i64::from(follower.cell.row) - i64::from(anchor.row);
        let d_col = i64::from(follower.cell.col) - i64::from(anchor.col);
        let cached = match worksheet.value(follower.cell) {
            CellValue::Empty => None,
            value => Some(value),
        };
        let text = normalize_formula_text(&shift_formula(text, d_row, d_col));
        worksheet.set_content(follower.cell, CellContent::Formula { text, cached });
    }
}
