//! In-memory element tree of a VTK XML document.
//!
//! Raw appended data is cut off before the markup is parsed, so the tree never
//! sees binary bytes.

use super::error::{
    MalformedAttribute, MalformedXml, MissingAttribute, MissingElement, ParseError, ParsedNameOrBytes,
    UnexpectedAttributeValue, UnexpectedElement,
};
use super::event_summary::EventSummary;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) children: Vec<Element>,
    pub(crate) text: String,
}

impl Element {
    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn required(&self, key: &str) -> Result<&str, ParseError> {
        self.attr(key)
            .ok_or_else(|| MissingAttribute::new(self.name.clone(), key.to_string()).into())
    }

    /// Parse an optional attribute; `expected` describes the value in errors.
    pub(crate) fn parse<T: FromStr>(&self, key: &str, expected: &str) -> Result<Option<T>, ParseError> {
        match self.attr(key) {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| {
                UnexpectedAttributeValue::new(
                    self.name.clone(),
                    key.to_string(),
                    expected.to_string(),
                    ParsedNameOrBytes::from(value),
                )
                .into()
            }),
        }
    }

    pub(crate) fn parse_required<T: FromStr>(&self, key: &str, expected: &str) -> Result<T, ParseError> {
        self.required(key)?;
        self.parse(key, expected)?
            .ok_or_else(|| MissingAttribute::new(self.name.clone(), key.to_string()).into())
    }

    /// A whitespace separated list of exactly `N` values.
    pub(crate) fn parse_list<T: FromStr + Copy + Default, const N: usize>(
        &self,
        key: &str,
        expected: &str,
    ) -> Result<Option<[T; N]>, ParseError> {
        let Some(value) = self.attr(key) else { return Ok(None) };
        let bad = || -> ParseError {
            UnexpectedAttributeValue::new(
                self.name.clone(),
                key.to_string(),
                expected.to_string(),
                ParsedNameOrBytes::from(value),
            )
            .into()
        };
        let mut out = [T::default(); N];
        let mut tokens = value.split_whitespace();
        for slot in out.iter_mut() {
            *slot = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(bad)?;
        }
        if tokens.next().is_some() {
            return Err(bad());
        }
        Ok(Some(out))
    }

    pub(crate) fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn expect_child(&self, name: &str) -> Result<&Element, ParseError> {
        self.child(name)
            .ok_or_else(|| MissingElement::new(self.name.clone(), name.to_string()).into())
    }

    pub(crate) fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// A parsed document: the `VTKFile` element and the raw appended block, if any.
#[derive(Debug)]
pub(crate) struct Document<'a> {
    pub(crate) root: Element,
    pub(crate) appended: Option<&'a [u8]>,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn element_of(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(MalformedAttribute::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(MalformedXml::from)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Split off `<AppendedData encoding="raw">_...` and return the markup before it
/// and the bytes after the underscore.
fn split_appended(bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), ParseError> {
    let Some(start) = find(bytes, b"<AppendedData") else { return Ok((bytes, None)) };
    let tag_len = bytes[start..]
        .iter()
        .position(|&b| b == b'>')
        .ok_or_else(|| MissingElement::new("AppendedData".to_string(), ">".to_string()))?;
    let tag = element_of_tag(&bytes[start..=start + tag_len])?;
    let encoding = tag.attr("encoding").unwrap_or("raw");
    if encoding != "raw" {
        return Err(UnexpectedAttributeValue::new(
            "AppendedData".into(),
            "encoding".into(),
            "raw".into(),
            ParsedNameOrBytes::from(encoding),
        )
        .into());
    }
    let after = start + tag_len + 1;
    let underscore = bytes[after..]
        .iter()
        .position(|&b| b == b'_')
        .ok_or_else(|| MissingElement::new("AppendedData".to_string(), "_".to_string()))?;
    Ok((&bytes[..start], Some(&bytes[after + underscore + 1..])))
}

fn element_of_tag(tag: &[u8]) -> Result<Element, ParseError> {
    let mut reader = Reader::from_reader(tag);
    let mut buf = Vec::new();
    match reader.read_event_into(&mut buf).map_err(MalformedXml::from)? {
        Event::Start(e) | Event::Empty(e) => element_of(&e),
        other => Err(UnexpectedElement::new("AppendedData", EventSummary::new(&other)).into()),
    }
}

pub(crate) fn parse_document(bytes: &[u8]) -> Result<Document<'_>, ParseError> {
    let (markup, appended) = split_appended(bytes)?;
    let mut reader = Reader::from_reader(markup);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }

    loop {
        let event = reader.read_event_into(&mut buf).map_err(MalformedXml::from)?;
        if let Event::Start(e) | Event::Empty(e) = &event {
            if stack.is_empty() && root.is_none() && e.name().as_ref() != b"VTKFile" {
                return Err(UnexpectedElement::new("VTKFile", EventSummary::new(&event)).into());
            }
        }
        match event {
            Event::Start(e) => stack.push(element_of(&e)?),
            Event::Empty(e) => {
                let element = element_of(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(MalformedXml::from)?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    // elements left open by the appended block
    while let Some(element) = stack.pop() {
        attach(&mut stack, &mut root, element);
    }
    let root = root.ok_or_else(|| UnexpectedElement::new("VTKFile", EventSummary::eof()))?;
    Ok(Document { root, appended })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tree_and_splits_appended_data() {
        let mut bytes = br#"<?xml version="1.0"?>
<VTKFile type="PolyData" version="1.0">
  <PolyData>
    <Piece NumberOfPoints="2"><Points><DataArray Name="p" format="ascii">1 2 3</DataArray></Points></Piece>
  </PolyData>
  <AppendedData encoding="raw">
   _"#
        .to_vec();
        bytes.extend_from_slice(&[0xff, 0x00, b'<', b'>']);
        bytes.extend_from_slice(b"\n  </AppendedData>\n</VTKFile>");

        let doc = parse_document(&bytes).unwrap();
        assert_eq!(doc.root.name, "VTKFile");
        assert_eq!(doc.root.attr("type"), Some("PolyData"));
        let piece = doc.root.expect_child("PolyData").unwrap().expect_child("Piece").unwrap();
        assert_eq!(piece.parse_required::<usize>("NumberOfPoints", "a count").unwrap(), 2);
        let array = piece.expect_child("Points").unwrap().expect_child("DataArray").unwrap();
        assert_eq!(array.text, "1 2 3");
        assert_eq!(&doc.appended.unwrap()[..4], &[0xff, 0x00, b'<', b'>']);
        assert!(matches!(piece.expect_child("Cells"), Err(ParseError::MissingElement(_))));
        assert!(matches!(
            piece.parse_required::<usize>("Missing", "a count"),
            Err(ParseError::MissingAttribute(_))
        ));
    }

    #[test]
    fn rejects_foreign_root() {
        let err = parse_document(b"<html><body/></html>").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedElement(_)));
        assert!(err.to_string().contains("VTKFile"));
    }
}
