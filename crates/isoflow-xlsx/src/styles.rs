//! `xl/styles.xml`: mapping between `cellXfs` records and the model's [`StyleTable`].
//!
//! On read every `xf` is resolved into a full [`Style`] and interned; on write the
//! style table is emitted so that `xf` index == style id.

use std::collections::HashMap;

use isoflow_model::{
    Alignment, Border, BorderStyle, Color, Fill, FillPattern, Font, HorizontalAlignment, Style,
    StyleTable, VerticalAlignment,
};

use crate::read::ReadError;
use crate::xml::escape_xml;

const DEFAULT_FONT_NAME: &str = "Calibri";
const DEFAULT_FONT_SIZE_100PT: u16 = 1100;
const FIRST_CUSTOM_NUM_FMT_ID: u32 = 164;

fn builtin_num_fmt(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        14 => "m/d/yyyy",
        22 => "m/d/yyyy h:mm",
        49 => "@",
        _ => return None,
    })
}

fn builtin_num_fmt_id(code: &str) -> Option<u32> {
    [1, 2, 3, 4, 9, 10, 11, 14, 22, 49]
        .into_iter()
        .find(|id| builtin_num_fmt(*id) == Some(code))
}

/// Resolved `cellXfs` of a styles part.
#[derive(Debug, Default)]
pub(crate) struct StylesPart {
    xf_style_ids: Vec<u32>,
}

impl StylesPart {
    /// Parse `styles.xml`, interning every `xf` into `styles`.
    pub(crate) fn parse(xml: &str, styles: &mut StyleTable) -> Result<Self, ReadError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();

        let mut num_fmts: HashMap<u32, String> = HashMap::new();
        let mut fonts: Vec<Font> = Vec::new();
        let mut fills: Vec<Fill> = Vec::new();
        let mut borders: Vec<Border> = Vec::new();
        let mut xf_style_ids = Vec::new();

        for section in root.children().filter(|n| n.is_element()) {
            match section.tag_name().name() {
                "numFmts" => {
                    for fmt in children(section, "numFmt") {
                        if let (Some(id), Some(code)) = (
                            fmt.attribute("numFmtId").and_then(|v| v.parse().ok()),
                            fmt.attribute("formatCode"),
                        ) {
                            num_fmts.insert(id, code.to_string());
                        }
                    }
                }
                "fonts" => fonts = children(section, "font").map(parse_font).collect(),
                "fills" => fills = children(section, "fill").map(parse_fill).collect(),
                "borders" => borders = children(section, "border").map(parse_border).collect(),
                "cellXfs" => {
                    for xf in children(section, "xf") {
                        let style = resolve_xf(xf, &num_fmts, &fonts, &fills, &borders);
                        xf_style_ids.push(styles.intern(style));
                    }
                }
                _ => {}
            }
        }

        Ok(Self { xf_style_ids })
    }

    pub(crate) fn style_id_for_xf(&self, xf_index: u32) -> u32 {
        self.xf_style_ids
            .get(xf_index as usize)
            .copied()
            .unwrap_or(0)
    }
}

fn children<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> Option<roxmltree::Node<'a, 'input>> {
    children(node, name).next()
}

fn parse_bool_flag(node: Option<roxmltree::Node<'_, '_>>) -> bool {
    node.is_some_and(|n| {
        n.attribute("val")
            .map_or(true, crate::shared_strings::parse_xml_bool)
    })
}

fn parse_color(node: Option<roxmltree::Node<'_, '_>>) -> Option<Color> {
    node.and_then(|n| n.attribute("rgb"))
        .and_then(Color::parse_hex)
}

fn parse_font(node: roxmltree::Node<'_, '_>) -> Font {
    Font {
        name: child(node, "name")
            .and_then(|n| n.attribute("val"))
            .map(str::to_string),
        size_100pt: child(node, "sz")
            .and_then(|n| n.attribute("val"))
            .and_then(|v| v.parse::<f32>().ok())
            .map(|pt| (pt * 100.0).round() as u16),
        bold: parse_bool_flag(child(node, "b")),
        italic: parse_bool_flag(child(node, "i")),
        color: parse_color(child(node, "color")),
    }
}

fn parse_fill(node: roxmltree::Node<'_, '_>) -> Fill {
    let Some(pattern) = child(node, "patternFill") else {
        return Fill::default();
    };
    let kind = match pattern.attribute("patternType") {
        None | Some("none") => FillPattern::None,
        Some("gray125") => FillPattern::Gray125,
        Some("solid") => FillPattern::Solid,
        Some(other) => FillPattern::Other(other.to_string()),
    };
    Fill {
        pattern: kind,
        fg_color: parse_color(child(pattern, "fgColor")),
        bg_color: parse_color(child(pattern, "bgColor")),
    }
}

fn parse_border(node: roxmltree::Node<'_, '_>) -> Border {
    let edge = |name: &'static str| {
        child(node, name)
            .and_then(|n| n.attribute("style"))
            .map_or(BorderStyle::None, BorderStyle::from_ooxml)
    };
    let color = ["left", "right", "top", "bottom"]
        .into_iter()
        .filter_map(|name| parse_color(child(node, name).and_then(|n| child(n, "color"))))
        .next();
    Border {
        left: edge("left"),
        right: edge("right"),
        top: edge("top"),
        bottom: edge("bottom"),
        color,
    }
}

fn parse_alignment(node: roxmltree::Node<'_, '_>) -> Option<Alignment> {
    let horizontal = match node.attribute("horizontal") {
        Some("general") => Some(HorizontalAlignment::General),
        Some("left") => Some(HorizontalAlignment::Left),
        Some("center") | Some("centerContinuous") => Some(HorizontalAlignment::Center),
        Some("right") => Some(HorizontalAlignment::Right),
        _ => None,
    };
    let vertical = match node.attribute("vertical") {
        Some("top") => Some(VerticalAlignment::Top),
        Some("center") => Some(VerticalAlignment::Center),
        Some("bottom") => Some(VerticalAlignment::Bottom),
        _ => None,
    };
    let wrap_text = node
        .attribute("wrapText")
        .is_some_and(crate::shared_strings::parse_xml_bool);
    let alignment = Alignment {
        horizontal,
        vertical,
        wrap_text,
    };
    (alignment != Alignment::default()).then_some(alignment)
}

fn resolve_xf(
    xf: roxmltree::Node<'_, '_>,
    num_fmts: &HashMap<u32, String>,
    fonts: &[Font],
    fills: &[Fill],
    borders: &[Border],
) -> Style {
    let index = |name: &str| -> usize {
        xf.attribute(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
    };

    // Index 0 of each collection is the workbook default and maps to `None`.
    let font = match index("fontId") {
        0 => None,
        i => fonts.get(i).cloned(),
    };
    let fill = match index("fillId") {
        0 | 1 => None,
        i => fills.get(i).cloned().filter(|f| f.pattern != FillPattern::None),
    };
    let border = match index("borderId") {
        0 => None,
        i => borders.get(i).cloned().filter(|b| !b.is_empty()),
    };
    let number_format = match index("numFmtId") as u32 {
        0 => None,
        id => num_fmts
            .get(&id)
            .cloned()
            .or_else(|| builtin_num_fmt(id).map(str::to_string)),
    };
    let alignment = child(xf, "alignment").and_then(parse_alignment);

    Style {
        font,
        fill,
        border,
        alignment,
        number_format,
    }
}

/// Serialize `styles` so that each style id is its own `cellXfs` index.
pub(crate) fn write_styles_xml(styles: &StyleTable) -> String {
    let default_font = Font {
        name: Some(DEFAULT_FONT_NAME.to_string()),
        size_100pt: Some(DEFAULT_FONT_SIZE_100PT),
        ..Font::default()
    };

    let mut fonts: Vec<Font> = vec![default_font.clone()];
    let mut font_index: HashMap<Font, usize> = HashMap::from([(default_font, 0)]);
    let mut fills: Vec<Fill> = vec![
        Fill::default(),
        Fill {
            pattern: FillPattern::Gray125,
            ..Fill::default()
        },
    ];
    let mut borders: Vec<Border> = vec![Border::default()];
    let mut num_fmts: Vec<(u32, String)> = Vec::new();
    let mut xfs = String::new();

    for style in &styles.styles {
        let font_id = match &style.font {
            None => 0,
            Some(font) => {
                let font = Font {
                    name: font.name.clone().or_else(|| Some(DEFAULT_FONT_NAME.to_string())),
                    size_100pt: font.size_100pt.or(Some(DEFAULT_FONT_SIZE_100PT)),
                    ..font.clone()
                };
                *font_index.entry(font.clone()).or_insert_with(|| {
                    fonts.push(font);
                    fonts.len() - 1
                })
            }
        };
        let fill_id = match &style.fill {
            None => 0,
            Some(fill) => position_or_push(&mut fills, fill),
        };
        let border_id = match &style.border {
            None => 0,
            Some(border) => position_or_push(&mut borders, border),
        };
        let num_fmt_id = match style.number_format.as_deref() {
            None | Some("General") => 0,
            Some(code) => builtin_num_fmt_id(code).unwrap_or_else(|| {
                match num_fmts.iter().find(|(_, c)| c == code) {
                    Some((id, _)) => *id,
                    None => {
                        let id = FIRST_CUSTOM_NUM_FMT_ID + num_fmts.len() as u32;
                        num_fmts.push((id, code.to_string()));
                        id
                    }
                }
            }),
        };

        let mut attrs = format!(
            r#" numFmtId="{num_fmt_id}" fontId="{font_id}" fillId="{fill_id}" borderId="{border_id}" xfId="0""#
        );
        if num_fmt_id != 0 {
            attrs.push_str(r#" applyNumberFormat="1""#);
        }
        if font_id != 0 {
            attrs.push_str(r#" applyFont="1""#);
        }
        if fill_id != 0 {
            attrs.push_str(r#" applyFill="1""#);
        }
        if border_id != 0 {
            attrs.push_str(r#" applyBorder="1""#);
        }
        match &style.alignment {
            Some(alignment) => {
                attrs.push_str(r#" applyAlignment="1""#);
                xfs.push_str(&format!("<xf{attrs}>{}</xf>", alignment_xml(alignment)));
            }
            None => xfs.push_str(&format!("<xf{attrs}/>")),
        }
    }

    let num_fmts_xml = if num_fmts.is_empty() {
        String::new()
    } else {
        let items: String = num_fmts
            .iter()
            .map(|(id, code)| {
                format!(r#"<numFmt numFmtId="{id}" formatCode="{}"/>"#, escape_xml(code))
            })
            .collect();
        format!(r#"<numFmts count="{}">{items}</numFmts>"#, num_fmts.len())
    };
    let fonts_xml: String = fonts.iter().map(font_xml).collect();
    let fills_xml: String = fills.iter().map(fill_xml).collect();
    let borders_xml: String = borders.iter().map(border_xml).collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  {num_fmts_xml}
  <fonts count="{}">{fonts_xml}</fonts>
  <fills count="{}">{fills_xml}</fills>
  <borders count="{}">{borders_xml}</borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="{}">{xfs}</cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#,
        fonts.len(),
        fills.len(),
        borders.len(),
        styles.len()
    )
}

fn position_or_push<T: PartialEq + Clone>(items: &mut Vec<T>, item: &T) -> usize {
    match items.iter().position(|i| i == item) {
        Some(idx) => idx,
        None => {
            items.push(item.clone());
            items.len() - 1
        }
    }
}

fn color_xml(tag: &str, color: Option<Color>) -> String {
    match color {
        Some(color) => format!(r#"<{tag} rgb="{}"/>"#, color.to_argb_hex()),
        None => String::new(),
    }
}

fn font_xml(font: &Font) -> String {
    let mut out = String::from("<font>");
    if font.bold {
        out.push_str("<b/>");
    }
    if font.italic {
        out.push_str("<i/>");
    }
    if let Some(size) = font.size_100pt {
        out.push_str(&format!(r#"<sz val="{}"/>"#, f64::from(size) / 100.0));
    }
    out.push_str(&color_xml("color", font.color));
    if let Some(name) = &font.name {
        out.push_str(&format!(r#"<name val="{}"/>"#, escape_xml(name)));
    }
    out.push_str("</font>");
    out
}

fn fill_xml(fill: &Fill) -> String {
    let pattern = match &fill.pattern {
        FillPattern::None => "none",
        FillPattern::Gray125 => "gray125",
        FillPattern::Solid => "solid",
        FillPattern::Other(other) => other.as_str(),
    };
    let colors = format!(
        "{}{}",
        color_xml("fgColor", fill.fg_color),
        color_xml("bgColor", fill.bg_color)
    );
    if colors.is_empty() {
        format!(r#"<fill><patternFill patternType="{}"/></fill>"#, escape_xml(pattern))
    } else {
        format!(
            r#"<fill><patternFill patternType="{}">{colors}</patternFill></fill>"#,
            escape_xml(pattern)
        )
    }
}

fn border_xml(border: &Border) -> String {
    let edge = |tag: &str, style: BorderStyle| match style.to_ooxml() {
        Some(style) => {
            let color = border.color.unwrap_or_else(Color::black);
            format!(
                r#"<{tag} style="{style}"><color rgb="{}"/></{tag}>"#,
                color.to_argb_hex()
            )
        }
        None => format!("<{tag}/>"),
    };
    format!(
        "<border>{}{}{}{}<diagonal/></border>",
        edge("left", border.left),
        edge("right", border.right),
        edge("top", border.top),
        edge("bottom", border.bottom)
    )
}

fn alignment_xml(alignment: &Alignment) -> String {
    let mut attrs = String::new();
    if let Some(h) = alignment.horizontal {
        let v = match h {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
        };
        attrs.push_str(&format!(r#" horizontal="{v}""#));
    }
    if let Some(v) = alignment.vertical {
        let v = match v {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
        };
        attrs.push_str(&format!(r#" vertical="{v}""#));
    }
    if alignment.wrap_text {
        attrs.push_str(r#" wrapText="1""#);
    }
    format!("<alignment{attrs}/>")
}
