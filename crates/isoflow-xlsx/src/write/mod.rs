//! Serialize an [`isoflow_model::Workbook`] into an `.xlsx` package.

use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::path::Path;

use isoflow_model::{Cell, CellContent, CellRef, CellValue, Workbook, Worksheet};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::save::atomic_write;
use crate::shared_strings::SharedStringsBuilder;
use crate::styles::write_styles_xml;
use crate::xml::escape_xml;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Write `workbook` to `path`, replacing any existing file atomically.
pub fn write_workbook(workbook: &Workbook, path: impl AsRef<Path>) -> Result<(), WriteError> {
    atomic_write(path, |file| write_workbook_to_writer(workbook, file))
}

pub fn write_workbook_to_writer<W: Write + Seek>(
    workbook: &Workbook,
    writer: W,
) -> Result<(), WriteError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // Sheets are rendered first so the shared string table is complete.
    let mut shared_strings = SharedStringsBuilder::default();
    let sheet_xmls: Vec<String> = workbook
        .sheets
        .iter()
        .map(|sheet| sheet_xml(sheet, &mut shared_strings))
        .collect();
    let has_shared_strings = !shared_strings.is_empty();

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(root_rels_xml().as_bytes())?;

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(workbook, has_shared_strings).as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(workbook).as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(workbook, has_shared_strings).as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(write_styles_xml(&workbook.styles).as_bytes())?;

    if has_shared_strings {
        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(shared_strings.to_xml().as_bytes())?;
    }

    for (idx, xml) in sheet_xmls.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
        zip.write_all(xml.as_bytes())?;
    }

    let _writer = zip.finish()?;
    Ok(())
}

fn root_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_string()
}

fn content_types_xml(workbook: &Workbook, has_shared_strings: bool) -> String {
    let mut overrides = String::new();
    overrides.push_str(
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    overrides.push_str(
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    if has_shared_strings {
        overrides.push_str(
            r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
        );
    }
    for sheet_number in 1..=workbook.sheets.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{sheet_number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  {overrides}
</Types>"#
    )
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut sheets_xml = String::new();
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        let sheet_id = idx + 1;
        sheets_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{sheet_id}" r:id="rId{sheet_id}"/>"#,
            escape_xml(&sheet.name)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <bookViews><workbookView activeTab="{}"/></bookViews>
  <sheets>
    {sheets_xml}
  </sheets>
  {}
  <calcPr calcId="191029" fullCalcOnLoad="1"/>
</workbook>"#,
        workbook.active_sheet_index(),
        filter_database_names_xml(workbook)
    )
}

/// Excel expects a hidden `_xlnm._FilterDatabase` name for every sheet-level AutoFilter.
fn filter_database_names_xml(workbook: &Workbook) -> String {
    let mut names = String::new();
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        let Some(filter) = &sheet.auto_filter else {
            continue;
        };
        let refers_to = format!(
            "'{}'!{}",
            sheet.name.replace('\'', "''"),
            filter.range.to_absolute_a1()
        );
        names.push_str(&format!(
            r#"<definedName name="_xlnm._FilterDatabase" localSheetId="{idx}" hidden="1">{}</definedName>"#,
            escape_xml(&refers_to)
        ));
    }
    if names.is_empty() {
        names
    } else {
        format!("<definedNames>{names}</definedNames>")
    }
}

fn workbook_rels_xml(workbook: &Workbook, has_shared_strings: bool) -> String {
    let mut rels = String::new();
    for rel_id in 1..=workbook.sheets.len() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{rel_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{rel_id}.xml"/>"#
        ));
    }
    let mut next = workbook.sheets.len() + 1;
    if has_shared_strings {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#
        ));
        next += 1;
    }
    rels.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  {rels}
</Relationships>"#
    )
}

fn sheet_xml(sheet: &Worksheet, shared_strings: &mut SharedStringsBuilder) -> String {
    let sheet_view = if sheet.tab_selected {
        r#"<sheetView tabSelected="1" workbookViewId="0"/>"#
    } else {
        r#"<sheetView workbookViewId="0"/>"#
    };

    let mut cols_xml = String::new();
    for (col, props) in sheet.iter_col_properties() {
        if let Some(width) = props.width {
            let n = col + 1;
            cols_xml.push_str(&format!(
                r#"<col min="{n}" max="{n}" width="{width}" customWidth="1"/>"#
            ));
        }
    }
    if !cols_xml.is_empty() {
        cols_xml = format!("<cols>{cols_xml}</cols>");
    }

    // Rows come from both stored cells and row properties (a hidden row may be blank).
    let mut rows: BTreeMap<u32, Vec<(CellRef, &Cell)>> = BTreeMap::new();
    for (cell_ref, cell) in sheet.iter_cells() {
        rows.entry(cell_ref.row).or_default().push((cell_ref, cell));
    }
    for (row, _) in sheet.iter_row_properties() {
        rows.entry(row).or_default();
    }

    let mut sheet_data = String::new();
    for (row, cells) in &rows {
        let mut attrs = format!(r#" r="{}""#, row + 1);
        if let Some(props) = sheet.row_properties(*row) {
            if let Some(height) = props.height {
                attrs.push_str(&format!(r#" ht="{height}" customHeight="1""#));
            }
            if props.hidden {
                attrs.push_str(r#" hidden="1""#);
            }
        }
        if cells.is_empty() {
            sheet_data.push_str(&format!("<row{attrs}/>"));
            continue;
        }
        sheet_data.push_str(&format!("<row{attrs}>"));
        for (cell_ref, cell) in cells {
            sheet_data.push_str(&cell_xml(*cell_ref, cell, shared_strings));
        }
        sheet_data.push_str("</row>");
    }

    let auto_filter_xml = match &sheet.auto_filter {
        None => String::new(),
        Some(filter) => {
            let mut inner = String::new();
            for column in &filter.filter_columns {
                let values: String = column
                    .values
                    .iter()
                    .map(|v| format!(r#"<filter val="{}"/>"#, escape_xml(v)))
                    .collect();
                inner.push_str(&format!(
                    r#"<filterColumn colId="{}"><filters>{values}</filters></filterColumn>"#,
                    column.col_id
                ));
            }
            if let Some(sort) = &filter.sort_state {
                let conditions: String = sort
                    .conditions
                    .iter()
                    .map(|c| {
                        let descending = if c.descending { r#" descending="1""# } else { "" };
                        format!(r#"<sortCondition{descending} ref="{}"/>"#, c.range)
                    })
                    .collect();
                inner.push_str(&format!(
                    r#"<sortState ref="{}">{conditions}</sortState>"#,
                    sort.range
                ));
            }
            if inner.is_empty() {
                format!(r#"<autoFilter ref="{}"/>"#, filter.range)
            } else {
                format!(r#"<autoFilter ref="{}">{inner}</autoFilter>"#, filter.range)
            }
        }
    };

    let merge_xml = if sheet.merged_regions.is_empty() {
        String::new()
    } else {
        let refs: String = sheet
            .merged_regions
            .iter()
            .map(|r| format!(r#"<mergeCell ref="{r}"/>"#))
            .collect();
        format!(
            r#"<mergeCells count="{}">{refs}</mergeCells>"#,
            sheet.merged_regions.len()
        )
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheetViews>{sheet_view}</sheetViews>
  <sheetFormatPr defaultRowHeight="15"/>
  {cols_xml}
  <sheetData>{sheet_data}</sheetData>
  {auto_filter_xml}
  {merge_xml}
</worksheet>"#
    )
}

fn cell_xml(cell_ref: CellRef, cell: &Cell, shared_strings: &mut SharedStringsBuilder) -> String {
    let mut attrs = format!(r#" r="{}""#, cell_ref.to_a1());
    if cell.style_id != 0 {
        attrs.push_str(&format!(r#" s="{}""#, cell.style_id));
    }

    let mut value_xml = String::new();
    match &cell.content {
        CellContent::Formula { text, cached } => {
            value_xml.push_str(&format!("<f>{}</f>", escape_xml(text)));
            match cached {
                None | Some(CellValue::Empty) => {}
                Some(CellValue::String(s)) => {
                    attrs.push_str(r#" t="str""#);
                    value_xml.push_str(&format!("<v>{}</v>", escape_xml(s)));
                }
                Some(other) => push_scalar(other, &mut attrs, &mut value_xml),
            }
        }
        CellContent::Literal { value } => match value {
            CellValue::Empty => {}
            CellValue::String(s) => {
                attrs.push_str(r#" t="s""#);
                value_xml.push_str(&format!("<v>{}</v>", shared_strings.intern_plain(s)));
            }
            other => push_scalar(other, &mut attrs, &mut value_xml),
        },
        CellContent::RichText { text } => {
            attrs.push_str(r#" t="s""#);
            value_xml.push_str(&format!("<v>{}</v>", shared_strings.intern_rich(text)));
        }
    }

    if value_xml.is_empty() {
        format!("<c{attrs}/>")
    } else {
        format!("<c{attrs}>{value_xml}</c>")
    }
}

fn push_scalar(value: &CellValue, attrs: &mut String, value_xml: &mut String) {
    match value {
        CellValue::Number(n) if n.is_finite() => {
            value_xml.push_str(&format!("<v>{n}</v>"));
        }
        CellValue::Number(_) => {
            attrs.push_str(r#" t="e""#);
            value_xml.push_str("<v>#NUM!</v>");
        }
        CellValue::Boolean(b) => {
            attrs.push_str(r#" t="b""#);
            value_xml.push_str(&format!("<v>{}</v>", u8::from(*b)));
        }
        CellValue::Error(e) => {
            attrs.push_str(r#" t="e""#);
            value_xml.push_str(&format!("<v>{}</v>", escape_xml(e)));
        }
        CellValue::String(s) => {
            attrs.push_str(r#" t="str""#);
            value_xml.push_str(&format!("<v>{}</v>", escape_xml(s)));
        }
        CellValue::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoflow_model::{Range, SheetAutoFilter};

    #[test]
    fn filter_database_name_quotes_sheet_name() {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("To Sort");
        let sheet = workbook.sheet_mut(id).unwrap();
        sheet.auto_filter = Some(SheetAutoFilter::new(Range::from_a1("A1:AA40").unwrap()));

        let xml = filter_database_names_xml(&workbook);
        assert_eq!(
            xml,
            r#"<definedNames><definedName name="_xlnm._FilterDatabase" localSheetId="0" hidden="1">&apos;To Sort&apos;!$A$1:$AA$40</definedName></definedNames>"#
        );
    }

    #[test]
    fn uncached_formula_has_no_value_element() {
        let mut sst = SharedStringsBuilder::default();
        let cell = Cell::new(CellContent::formula("=ROUND(R3-R8,3)"));
        assert_eq!(
            cell_xml(CellRef::new(8, 17), &cell, &mut sst),
            r#"<c r="R9"><f>ROUND(R3-R8,3)</f></c>"#
        );

        let cached = Cell {
            content: CellContent::Formula {
                text: r#"IF(J3<400,"check","ok")"#.to_string(),
                cached: Some(CellValue::String("ok".to_string())),
            },
            style_id: 2,
        };
        assert_eq!(
            cell_xml(CellRef::new(2, 26), &cached, &mut sst),
            r#"<c r="AA3" s="2" t="str"><f>IF(J3&lt;400,&quot;check&quot;,&quot;ok&quot;)</f><v>ok</v></c>"#
        );
        assert!(sst.is_empty());
    }
}
