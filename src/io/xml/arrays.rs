//! `DataArray` elements: ascii, inline base64 and raw appended payloads.

use super::error::{ArrayData, ParseError, ParsedNameOrBytes, UnexpectedAttributeValue};
use super::tree::Element;
use super::Encoding;
use crate::array::{DataArray, ScalarType};
use crate::io::encode::{from_bytes, from_tokens, to_ascii, to_bytes, ByteOrder};
use crate::{Error, Result};

/// Width of the byte-count header in front of every binary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderType {
    UInt32,
    UInt64,
}

impl HeaderType {
    fn size(&self) -> usize {
        match self {
            Self::UInt32 => 4,
            Self::UInt64 => 8,
        }
    }
}

/// Decoding settings taken from the `VTKFile` element.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PayloadReader<'a> {
    order: ByteOrder,
    header: HeaderType,
    appended: Option<&'a [u8]>,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(root: &Element, appended: Option<&'a [u8]>) -> Result<Self> {
        if let Some(compressor) = root.attr("compressor") {
            return Err(Error::file_format(format!("compressed files are not supported ({compressor})")));
        }
        let order = match root.attr("byte_order").unwrap_or("LittleEndian") {
            "LittleEndian" => ByteOrder::Little,
            "BigEndian" => ByteOrder::Big,
            other => return Err(unexpected(root, "byte_order", "LittleEndian or BigEndian", other).into()),
        };
        let header = match root.attr("header_type").unwrap_or("UInt32") {
            "UInt32" => HeaderType::UInt32,
            "UInt64" => HeaderType::UInt64,
            other => return Err(unexpected(root, "header_type", "UInt32 or UInt64", other).into()),
        };
        Ok(Self { order, header, appended })
    }

    fn block_length(&self, bytes: &[u8], name: &str) -> Result<usize> {
        let n = self.header.size();
        if bytes.len() < n {
            return Err(array_error(name, "binary block shorter than its header").into());
        }
        let length = match (self.header, self.order) {
            (HeaderType::UInt32, ByteOrder::Little) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            (HeaderType::UInt32, ByteOrder::Big) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            (HeaderType::UInt64, order) => {
                let mut word = [0u8; 8];
                word.copy_from_slice(&bytes[..8]);
                match order {
                    ByteOrder::Little => u64::from_le_bytes(word),
                    ByteOrder::Big => u64::from_be_bytes(word),
                }
            }
        };
        usize::try_from(length).map_err(|_| array_error(name, "binary block too large").into())
    }

    /// Header and payload of one binary block starting at `bytes`.
    fn block<'b>(&self, bytes: &'b [u8], name: &str) -> Result<&'b [u8]> {
        let length = self.block_length(bytes, name)?;
        let start = self.header.size();
        bytes
            .get(start..start + length)
            .ok_or_else(|| array_error(name, format!("binary block of {length} bytes is truncated")).into())
    }

    fn inline_binary(&self, text: &str, name: &str) -> Result<Vec<u8>> {
        let compact: String = text.split_whitespace().collect();
        match base64::decode(&compact) {
            Ok(decoded) => Ok(self.block(&decoded, name)?.to_vec()),
            Err(_) => {
                // header and payload encoded as two separate base64 runs
                let header_chars = (self.header.size() + 2) / 3 * 4;
                let (head, body) = compact.split_at(header_chars.min(compact.len()));
                let mut decoded = base64::decode(head)?;
                decoded.truncate(self.header.size());
                let length = self.block_length(&decoded, name)?;
                let mut body = base64::decode(body)?;
                if body.len() < length {
                    return Err(array_error(name, "base64 payload is truncated").into());
                }
                body.truncate(length);
                Ok(body)
            }
        }
    }

    /// Read a `DataArray` element. `tuples` is the count implied by the enclosing
    /// element when the array itself does not state it.
    pub(crate) fn read(&self, element: &Element, tuples: Option<usize>, default_name: &str) -> Result<DataArray> {
        let type_name = element.required("type")?;
        let ty = ScalarType::from_xml_name(type_name)
            .ok_or_else(|| unexpected(element, "type", "a VTK scalar type name", type_name))?;
        // bit arrays are stored one value per byte
        let ty = if ty == ScalarType::Bit { ScalarType::UnsignedChar } else { ty };
        let name = element.attr("Name").unwrap_or(default_name);
        let components = element.parse::<usize>("NumberOfComponents", "a component count")?.unwrap_or(1).max(1);
        let tuples = element.parse::<usize>("NumberOfTuples", "a tuple count")?.or(tuples);
        let format = element.required("format")?;
        let array = match format {
            "ascii" => {
                let tokens: Vec<&str> = element.text.split_whitespace().collect();
                let count = tuples.map_or(tokens.len(), |t| t * components);
                from_tokens(name, ty, components, count, tokens)?
            }
            "binary" => {
                let bytes = self.inline_binary(&element.text, name)?;
                from_bytes(name, ty, components, &bytes, self.order)?
            }
            "appended" => {
                let offset = element.parse_required::<usize>("offset", "a byte offset")?;
                let appended = self
                    .appended
                    .ok_or_else(|| array_error(name, "appended array without an AppendedData block"))?;
                let block = appended
                    .get(offset..)
                    .ok_or_else(|| array_error(name, format!("offset {offset} is past the appended data")))?;
                from_bytes(name, ty, components, self.block(block, name)?, self.order)?
            }
            other => return Err(unexpected(element, "format", "ascii, binary or appended", other).into()),
        };
        if let Some(t) = tuples {
            if array.number_of_tuples() != t {
                return Err(array_error(
                    name,
                    format!("expected {t} tuples, found {}", array.number_of_tuples()),
                )
                .into());
            }
        }
        Ok(array)
    }
}

fn unexpected(element: &Element, attribute: &str, expected: &str, actual: &str) -> ParseError {
    UnexpectedAttributeValue::new(
        element.name.clone(),
        attribute.to_string(),
        expected.to_string(),
        ParsedNameOrBytes::from(actual),
    )
    .into()
}

fn array_error(name: &str, reason: impl Into<String>) -> ParseError {
    ArrayData::new(name.to_string(), reason.into()).into()
}

/// Attribute list and body of a `DataArray` element about to be written.
pub(crate) struct EncodedArray {
    pub(crate) attributes: Vec<(&'static str, String)>,
    /// inline text; `None` for appended arrays
    pub(crate) text: Option<String>,
}

/// Encode `array`. Appended payloads are pushed onto `appended` (header first).
pub(crate) fn encode(array: &DataArray, encoding: Encoding, appended: &mut Vec<u8>) -> EncodedArray {
    let ty = match array.scalar_type() {
        ScalarType::Bit => ScalarType::UnsignedChar,
        ty => ty,
    };
    let mut attributes = vec![("type", ty.xml_name().to_string())];
    if let Some(name) = array.name() {
        attributes.push(("Name", name.to_string()));
    }
    attributes.push(("NumberOfComponents", array.number_of_components().to_string()));
    attributes.push(("NumberOfTuples", array.number_of_tuples().to_string()));
    attributes.push(("format", encoding.as_str().to_string()));
    let text = match encoding {
        Encoding::Ascii => Some(to_ascii(array, 6)),
        Encoding::Binary => {
            let bytes = to_bytes(array, ByteOrder::Little);
            let mut block = Vec::with_capacity(bytes.len() + 8);
            block.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            block.extend_from_slice(&bytes);
            Some(base64::encode(&block))
        }
        Encoding::Appended => {
            attributes.push(("offset", appended.len().to_string()));
            let bytes = to_bytes(array, ByteOrder::Little);
            appended.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            appended.extend_from_slice(&bytes);
            None
        }
    };
    EncodedArray { attributes, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::xml::tree::parse_document;

    fn root(header: &str) -> Element {
        Element {
            name: "VTKFile".into(),
            attributes: vec![("header_type".into(), header.into())],
            ..Element::default()
        }
    }

    #[test]
    fn base64_with_32_bit_header() {
        let values = [1.0f32, 2.0, 3.0];
        let mut block = 12u32.to_le_bytes().to_vec();
        for v in values {
            block.extend_from_slice(&v.to_le_bytes());
        }
        let element = Element {
            name: "DataArray".into(),
            attributes: vec![
                ("type".into(), "Float32".into()),
                ("Name".into(), "x".into()),
                ("format".into(), "binary".into()),
            ],
            text: base64::encode(&block),
            ..Element::default()
        };
        let reader = PayloadReader::new(&root("UInt32"), None).unwrap();
        let array = reader.read(&element, Some(3), "x").unwrap();
        assert_eq!(array, DataArray::scalars("x", values.to_vec()));
        assert!(reader.read(&element, Some(4), "x").is_err());
    }

    #[test]
    fn appended_blocks_follow_their_offsets() {
        let a = DataArray::from_tuples("a", vec![[1i32, 2], [3, 4]]);
        let b = DataArray::scalars("b", vec![0.5f64]);
        let mut appended = Vec::new();
        let ea = encode(&a, Encoding::Appended, &mut appended);
        let eb = encode(&b, Encoding::Appended, &mut appended);
        assert!(ea.text.is_none());
        let to_element = |e: EncodedArray| Element {
            name: "DataArray".into(),
            attributes: e.attributes.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ..Element::default()
        };
        let reader = PayloadReader::new(&root("UInt64"), Some(&appended)).unwrap();
        assert_eq!(reader.read(&to_element(ea), None, "").unwrap(), a);
        assert_eq!(reader.read(&to_element(eb), None, "").unwrap(), b);
    }

    #[test]
    fn compressed_files_are_refused() {
        let doc = parse_document(br#"<VTKFile type="ImageData" compressor="vtkZLibDataCompressor"/>"#).unwrap();
        assert!(PayloadReader::new(&doc.root, None).is_err());
    }
}
