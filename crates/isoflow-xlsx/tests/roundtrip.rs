use std::io::Cursor;

use isoflow_model::{
    Alignment, Border, BorderStyle, CellContent, CellRef, CellValue, Color, Fill, Font, Range,
    RichText, RichTextRunStyle, SheetAutoFilter, Style, Workbook,
};
use isoflow_xlsx::{read_workbook, read_workbook_from_bytes, write_workbook, write_workbook_to_writer};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn a1(s: &str) -> CellRef {
    CellRef::from_a1(s).unwrap()
}

fn to_bytes(workbook: &Workbook) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_workbook_to_writer(workbook, &mut cursor).unwrap();
    cursor.into_inner()
}

fn sample_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    let raw = workbook.add_sheet("Default_Gas_Bench.wke");
    let data = workbook.insert_sheet(0, "Data");
    workbook.activate(data);

    let band = workbook.styles.intern(Style {
        fill: Some(Fill::solid(Color::from_rgb(0x808080))),
        ..Style::default()
    });
    let boxed = workbook.styles.intern(Style {
        font: Some(Font::colored(Color::from_rgb(0x008000), true)),
        border: Some(Border {
            top: BorderStyle::Thick,
            bottom: BorderStyle::Thick,
            ..Border::default()
        }),
        alignment: Some(Alignment::centered()),
        number_format: Some("@".to_string()),
        ..Style::default()
    });

    let sheet = workbook.sheet_mut(data).unwrap();
    sheet.set_value(a1("A1"), "Line");
    sheet.set_value(a1("J3"), 2450.0);
    sheet.set_value(a1("D3"), "0042");
    sheet.set_value(a1("Q3"), true);
    sheet.set_formula(a1("R3"), "=ROUND(AVERAGE(L3,L4,L6),3)");
    sheet.set_content(
        a1("Z3"),
        CellContent::Formula {
            text: r#"IF(J3>J4,IF(J4<J3,"ok","check"),"check")"#.to_string(),
            cached: Some(CellValue::String("ok".to_string())),
        },
    );
    sheet.set_content(
        a1("X3"),
        CellContent::Formula {
            text: "ROUND(SUM(K3:K8),2)".to_string(),
            cached: Some(CellValue::Number(123.45)),
        },
    );
    sheet.set_rich_text(
        a1("I10"),
        RichText::from_segments([
            ("18 ", RichTextRunStyle::colored(Color::from_rgb(0xFF0000), true)),
            ("19", RichTextRunStyle::colored(Color::from_rgb(0x000080), true)),
        ]),
    );
    sheet.set_style_id(a1("A17"), band);
    sheet.set_style_id(a1("ZY17"), band);
    sheet.set_style_id(a1("F2"), boxed);
    sheet.merge(Range::from_a1("F2:G2").unwrap());
    sheet.set_row_height(2, Some(21.75));
    sheet.set_row_hidden(5, true);
    sheet.set_col_width(2, Some(22.0));
    let mut filter = SheetAutoFilter::new(Range::from_a1("A1:AA40").unwrap());
    filter.add_filter_column(16, vec!["last 6".to_string()]);
    filter.add_sort_condition(Range::from_a1("Q2:Q40").unwrap(), false);
    sheet.auto_filter = Some(filter);

    workbook
        .sheet_mut(raw)
        .unwrap()
        .set_value(a1("A1"), "Identifier 1");
    workbook
}

#[test]
fn workbook_survives_write_and_read() {
    let original = sample_workbook();
    let back = read_workbook_from_bytes(&to_bytes(&original)).unwrap();

    assert_eq!(back.sheet_names(), vec!["Data", "Default_Gas_Bench.wke"]);
    assert_eq!(back.active_sheet_index(), 0);

    let data = back.sheet_by_name("Data").unwrap();
    assert!(data.tab_selected);
    assert_eq!(data.value(a1("A1")), CellValue::String("Line".to_string()));
    assert_eq!(data.value(a1("J3")), CellValue::Number(2450.0));
    assert_eq!(data.value(a1("D3")), CellValue::String("0042".to_string()));
    assert_eq!(data.value(a1("Q3")), CellValue::Boolean(true));

    let r3 = data.content(a1("R3")).unwrap();
    assert_eq!(r3.formula_text(), Some("ROUND(AVERAGE(L3,L4,L6),3)"));
    assert!(r3.is_uncached_formula());

    let z3 = data.content(a1("Z3")).unwrap();
    assert_eq!(z3.formula_text(), Some(r#"IF(J3>J4,IF(J4<J3,"ok","check"),"check")"#));
    assert_eq!(z3.resolved_value(), CellValue::String("ok".to_string()));
    assert_eq!(data.value(a1("X3")), CellValue::Number(123.45));

    let original_data = original.sheet_by_name("Data").unwrap();
    assert_eq!(data.content(a1("I10")), original_data.content(a1("I10")));

    assert_eq!(data.merged_regions, vec![Range::from_a1("F2:G2").unwrap()]);
    assert_eq!(data.row_height(2), Some(21.75));
    assert!(data.is_row_hidden(5));
    assert_eq!(data.col_width(2), Some(22.0));
    assert_eq!(data.auto_filter, original_data.auto_filter);
}

#[test]
fn styles_survive_write_and_read() {
    let original = sample_workbook();
    let back = read_workbook_from_bytes(&to_bytes(&original)).unwrap();
    let data = back.sheet_by_name("Data").unwrap();

    let band = back.styles.get(data.style_id(a1("ZY17"))).unwrap();
    assert_eq!(
        band.fill.as_ref().and_then(Fill::visible_color).map(Color::rgb),
        Some(0x808080)
    );
    assert!(data.cell(a1("A17")).unwrap().content.is_empty());

    let boxed = back.styles.get(data.style_id(a1("F2"))).unwrap();
    let font = boxed.font.as_ref().unwrap();
    assert!(font.bold);
    assert_eq!(font.color.map(Color::rgb), Some(0x008000));
    assert_eq!(boxed.border.as_ref().unwrap().top, BorderStyle::Thick);
    assert_eq!(boxed.border.as_ref().unwrap().left, BorderStyle::None);
    assert_eq!(boxed.alignment, Some(Alignment::centered()));
    assert_eq!(boxed.number_format.as_deref(), Some("@"));
}

#[test]
fn write_workbook_replaces_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.xlsx");
    std::fs::write(&path, b"not a zip").unwrap();

    write_workbook(&sample_workbook(), &path).unwrap();
    let back = read_workbook(&path).unwrap();
    assert_eq!(back.sheets.len(), 2);
}

#[test]
fn missing_workbook_part_is_reported() {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        zip.start_file("hello.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, b"hi").unwrap();
        zip.finish().unwrap();
    }
    let err = read_workbook_from_bytes(cursor.get_ref()).unwrap_err();
    assert!(matches!(err, isoflow_xlsx::ReadError::MissingPart("xl/workbook.xml")));
}

proptest! {
    #[test]
    fn literal_strings_round_trip(values in proptest::collection::vec("[ -~]{0,12}", 1..8)) {
        let mut workbook = Workbook::new();
        let id = workbook.add_sheet("Last 6");
        let sheet = workbook.sheet_mut(id).unwrap();
        for (row, value) in values.iter().enumerate() {
            sheet.set_value(CellRef::new(row as u32, 2), value.as_str());
        }

        let back = read_workbook_from_bytes(&to_bytes(&workbook)).unwrap();
        let sheet = back.sheet_by_name("Last 6").unwrap();
        for (row, value) in values.iter().enumerate() {
            prop_assert_eq!(
                sheet.value(CellRef::new(row as u32, 2)),
                CellValue::String(value.clone())
            );
        }
    }
}
