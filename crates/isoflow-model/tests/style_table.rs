use isoflow_model::{
    Alignment, Border, BorderStyle, CellRef, Color, Fill, Font, Style, StyleTable, Workbook,
};
use pretty_assertions::assert_eq;

#[test]
fn interning_deduplicates_equal_styles() {
    let mut styles = StyleTable::new();
    assert_eq!(styles.len(), 1, "default style is always present");

    let bold = Style {
        font: Some(Font::bold()),
        ..Style::default()
    };
    let a = styles.intern(bold.clone());
    let b = styles.intern(bold);
    assert_eq!(a, b);
    assert_eq!(styles.intern(Style::default()), 0);
    assert_eq!(styles.len(), 2);
}

#[test]
fn layered_style_edits_accumulate() {
    let mut wb = Workbook::new();
    let id = wb.add_sheet("Group");
    let (sheet, styles) = wb.sheet_with_styles_mut(id).unwrap();
    let k10 = CellRef::from_a1("K10").unwrap();

    sheet.update_style(styles, k10, |s| {
        s.fill = Some(Fill::solid(Color::from_rgb(0xDAE9F8)))
    });
    sheet.update_style(styles, k10, |s| s.alignment = Some(Alignment::centered()));
    sheet.update_style(styles, k10, |s| {
        s.border = Some(Border {
            top: BorderStyle::Thick,
            left: BorderStyle::Thick,
            ..Border::default()
        })
    });

    let style = wb.styles.get(wb.sheets[0].style_id(k10)).unwrap();
    assert_eq!(style.fill_color().map(Color::rgb), Some(0xDAE9F8));
    assert_eq!(style.alignment, Some(Alignment::centered()));
    assert_eq!(style.border.as_ref().unwrap().top, BorderStyle::Thick);
    assert_eq!(style.border.as_ref().unwrap().bottom, BorderStyle::None);
}

#[test]
fn style_table_serde_rebuilds_index() {
    let mut styles = StyleTable::new();
    let green = Style {
        font: Some(Font::colored(Color::from_rgb(0x008000), true)),
        ..Style::default()
    };
    let id = styles.intern(green.clone());

    let json = serde_json::to_string(&styles).unwrap();
    assert!(json.contains("#FF008000"));
    let mut back: StyleTable = serde_json::from_str(&json).unwrap();
    assert_eq!(back.intern(green), id);
}
