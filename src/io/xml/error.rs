use super::event_summary::EventSummary;

use derive_more::{Constructor, Display, From};
use quick_xml::name::QName;

/// Failure while interpreting a VTK XML document.
#[derive(Debug, thiserror::Error, From)]
pub enum ParseError {
    #[error("{0}")]
    MalformedXml(MalformedXml),
    #[error("{0}")]
    MalformedAttribute(MalformedAttribute),
    #[error("{0}")]
    MissingAttribute(MissingAttribute),
    #[error("{0}")]
    MissingElement(MissingElement),
    #[error("{0}")]
    UnexpectedElement(UnexpectedElement),
    #[error("{0}")]
    UnexpectedAttributeValue(UnexpectedAttributeValue),
    #[error("{0}")]
    ArrayData(ArrayData),
}

#[derive(From, Display, Debug)]
#[display(fmt = "malformed xml: {source}")]
pub struct MalformedXml {
    source: quick_xml::Error,
}

#[derive(From, Display, Debug)]
#[display(fmt = "malformed xml attribute: {source}")]
pub struct MalformedAttribute {
    source: quick_xml::events::attributes::AttrError,
}

#[derive(Display, Debug)]
#[display(fmt = "expected a `{expected}` element, found {found}")]
pub struct UnexpectedElement {
    expected: String,
    found: EventSummary,
}

impl UnexpectedElement {
    pub(crate) fn new(expected: impl Into<String>, found: EventSummary) -> Self {
        Self {
            expected: expected.into(),
            found,
        }
    }
}

/// An attribute is present but its value cannot be used.
#[derive(Display, Debug, Constructor)]
#[display(fmt = "<{element} {attribute}=\"{value}\">: expected {expected}")]
pub struct UnexpectedAttributeValue {
    pub(crate) element: String,
    pub(crate) attribute: String,
    pub(crate) expected: String,
    pub(crate) value: ParsedNameOrBytes,
}

#[derive(Display, Debug, Constructor)]
#[display(fmt = "<{element}> has no `{attribute}` attribute")]
pub struct MissingAttribute {
    element: String,
    attribute: String,
}

#[derive(Display, Debug, Constructor)]
#[display(fmt = "<{element}> has no <{child}> child")]
pub struct MissingElement {
    element: String,
    child: String,
}

/// The payload of a `DataArray` does not match its declaration.
#[derive(Display, Debug, Constructor)]
#[display(fmt = "data array `{array_name}`: {reason}")]
pub struct ArrayData {
    array_name: String,
    reason: String,
}

/// Text taken from the document, kept as bytes when it is not UTF-8.
#[derive(From, Display, Debug)]
pub enum ParsedNameOrBytes {
    #[display(fmt = "{_0}")]
    Utf8(String),
    #[display(fmt = "{_0:?} (not UTF-8)")]
    Bytes(Vec<u8>),
}

impl ParsedNameOrBytes {
    pub(crate) fn new(bytes: &[u8]) -> Self {
        String::from_utf8(bytes.to_vec()).map_or_else(|e| Self::Bytes(e.into_bytes()), Self::Utf8)
    }
}

impl From<QName<'_>> for ParsedNameOrBytes {
    fn from(name: QName<'_>) -> Self {
        Self::new(name.as_ref())
    }
}

impl From<&str> for ParsedNameOrBytes {
    fn from(text: &str) -> Self {
        Self::Utf8(text.to_string())
    }
}
