//! `xl/sharedStrings.xml`: parsing (rich runs included) and generation.

use std::collections::HashMap;

use isoflow_model::{Color, RichText, RichTextRunStyle};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::read::ReadError;
use crate::xml::escape_xml;

pub(crate) fn parse_shared_strings_xml(xml: &[u8]) -> Result<Vec<RichText>, ReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(parse_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                items.push(RichText::default());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// Parse the children of an `<si>` or `<is>` element up to its end tag.
pub(crate) fn parse_si(reader: &mut Reader<&[u8]>) -> Result<RichText, ReadError> {
    let mut buf = Vec::new();
    let mut segments: Vec<(String, RichTextRunStyle)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                let t = read_text(reader, b"t")?;
                segments.push((t, RichTextRunStyle::default()));
            }
            Event::Start(e) if e.local_name().as_ref() == b"r" => {
                segments.push(parse_r(reader)?);
            }
            Event::Start(e) => {
                // Phonetic runs and extensions carry `<t>` elements that are not display text.
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if matches!(e.local_name().as_ref(), b"si" | b"is") => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <si>")),
            _ => {}
        }
        buf.clear();
    }

    if segments.iter().all(|(_, style)| style.is_empty()) {
        Ok(RichText::new(
            segments.into_iter().map(|(text, _)| text).collect::<String>(),
        ))
    } else {
        Ok(RichText::from_segments(segments))
    }
}

fn parse_r(reader: &mut Reader<&[u8]>) -> Result<(String, RichTextRunStyle), ReadError> {
    let mut buf = Vec::new();
    let mut style = RichTextRunStyle::default();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"rPr" => {
                style = parse_rpr(reader)?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, b"t")?);
            }
            Event::Start(e) => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"r" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <r>")),
            _ => {}
        }
        buf.clear();
    }

    Ok((text, style))
}

fn parse_rpr(reader: &mut Reader<&[u8]>) -> Result<RichTextRunStyle, ReadError> {
    let mut buf = Vec::new();
    let mut style = RichTextRunStyle::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) => parse_rpr_tag(&e, &mut style)?,
            Event::Start(e) => {
                parse_rpr_tag(&e, &mut style)?;
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"rPr" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <rPr>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(style)
}

fn parse_rpr_tag(e: &BytesStart<'_>, style: &mut RichTextRunStyle) -> Result<(), ReadError> {
    let val = attr_value(e, b"val")?;
    match e.local_name().as_ref() {
        b"b" => style.bold = Some(val.as_deref().map_or(true, parse_xml_bool)),
        b"i" => style.italic = Some(val.as_deref().map_or(true, parse_xml_bool)),
        b"rFont" => style.font = val,
        b"sz" => {
            style.size_100pt = val
                .and_then(|v| v.parse::<f32>().ok())
                .map(|pt| (pt * 100.0).round() as u16);
        }
        b"color" => {
            style.color = attr_value(e, b"rgb")?.and_then(|rgb| Color::parse_hex(&rgb));
        }
        _ => {}
    }
    Ok(())
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReadError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end_local: &[u8]) -> Result<String, ReadError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::End(e) if e.local_name().as_ref() == end_local => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <t>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

pub(crate) fn parse_xml_bool(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Shared string table accumulated while writing a workbook.
///
/// Plain strings are deduplicated by text; rich strings are deduplicated by value.
#[derive(Debug, Default)]
pub(crate) struct SharedStringsBuilder {
    values: Vec<RichText>,
    plain_index: HashMap<String, usize>,
}

impl SharedStringsBuilder {
    pub(crate) fn intern_plain(&mut self, text: &str) -> usize {
        if let Some(idx) = self.plain_index.get(text) {
            return *idx;
        }
        let idx = self.values.len();
        self.values.push(RichText::new(text));
        self.plain_index.insert(text.to_string(), idx);
        idx
    }

    pub(crate) fn intern_rich(&mut self, text: &RichText) -> usize {
        if text.is_plain() {
            return self.intern_plain(&text.text);
        }
        if let Some(idx) = self.values.iter().position(|v| v == text) {
            return idx;
        }
        self.values.push(text.clone());
        self.values.len() - 1
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn to_xml(&self) -> String {
        let count = self.values.len();
        let mut si = String::new();
        for value in &self.values {
            si.push_str("<si>");
            if value.is_plain() {
                si.push_str(&text_xml(&value.text));
            } else {
                for run in &value.runs {
                    si.push_str("<r>");
                    si.push_str(&rpr_xml(&run.style));
                    si.push_str(&text_xml(value.slice_run_text(run)));
                    si.push_str("</r>");
                }
            }
            si.push_str("</si>");
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{count}" uniqueCount="{count}">
  {si}
</sst>"#
        )
    }
}

fn text_xml(text: &str) -> String {
    let needs_preserve = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
    if needs_preserve {
        format!(r#"<t xml:space="preserve">{}</t>"#, escape_xml(text))
    } else {
        format!("<t>{}</t>", escape_xml(text))
    }
}

fn rpr_xml(style: &RichTextRunStyle) -> String {
    if style.is_empty() {
        return String::new();
    }
    let mut out = String::from("<rPr>");
    if let Some(font) = &style.font {
        out.push_str(&format!(r#"<rFont val="{}"/>"#, escape_xml(font)));
    }
    match style.bold {
        Some(true) => out.push_str("<b/>"),
        Some(false) => out.push_str(r#"<b val="0"/>"#),
        None => {}
    }
    match style.italic {
        Some(true) => out.push_str("<i/>"),
        Some(false) => out.push_str(r#"<i val="0"/>"#),
        None => {}
    }
    if let Some(color) = style.color {
        out.push_str(&format!(r#"<color rgb="{}"/>"#, color.to_argb_hex()));
    }
    if let Some(size) = style.size_100pt {
        out.push_str(&format!(r#"<sz val="{}"/>"#, f64::from(size) / 100.0));
    }
    out.push_str("</rPr>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_rich_items() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
  <si><t>Line</t></si>
  <si>
    <r><rPr><b val="0"/><color rgb="00FF0000"/></rPr><t xml:space="preserve">18 </t></r>
    <r><rPr><b/><color rgb="000000FF"/></rPr><t>19</t></r>
  </si>
</sst>"#;
        let items = parse_shared_strings_xml(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_plain());
        assert_eq!(items[0].text, "Line");

        let rich = &items[1];
        assert_eq!(rich.text, "18 19");
        assert_eq!(rich.runs[0].style.bold, Some(false));
        assert_eq!(rich.runs[1].style.bold, Some(true));
        assert_eq!(rich.runs[1].style.color.map(Color::rgb), Some(0x0000FF));
    }

    #[test]
    fn builder_dedups_plain_text() {
        let mut sst = SharedStringsBuilder::default();
        assert_eq!(sst.intern_plain("ok"), 0);
        assert_eq!(sst.intern_plain("check"), 1);
        assert_eq!(sst.intern_plain("ok"), 0);
        assert_eq!(sst.intern_rich(&RichText::new("check")), 1);

        let rich = RichText::from_segments([(
            "603",
            RichTextRunStyle::colored(Color::from_rgb(0x008000), true),
        )]);
        assert_eq!(sst.intern_rich(&rich), 2);
        assert_eq!(sst.intern_rich(&rich), 2);

        let xml = sst.to_xml();
        assert!(xml.contains(r#"<r><rPr><b/><color rgb="FF008000"/></rPr><t>603</t></r>"#));
        let back = parse_shared_strings_xml(xml.as_bytes()).unwrap();
        assert_eq!(back[2], rich);
    }
}
