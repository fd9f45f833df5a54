//! Conversions between data arrays and their on-disk byte and text forms.

use crate::array::{with_buffer, DataArray, Scalar, ScalarType, Storage};
use crate::{Error, Result};

/// Run `$body` with `$t` bound to the Rust type behind a [`Storage`].
macro_rules! with_storage {
    ($storage:expr, $t:ident => $body:expr) => {
        match $storage {
            Storage::I8 => {
                type $t = i8;
                $body
            }
            Storage::U8 => {
                type $t = u8;
                $body
            }
            Storage::I16 => {
                type $t = i16;
                $body
            }
            Storage::U16 => {
                type $t = u16;
                $body
            }
            Storage::I32 => {
                type $t = i32;
                $body
            }
            Storage::U32 => {
                type $t = u32;
                $body
            }
            Storage::I64 => {
                type $t = i64;
                $body
            }
            Storage::U64 => {
                type $t = u64;
                $body
            }
            Storage::F32 => {
                type $t = f32;
                $body
            }
            Storage::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

/// Live values of `array` as raw bytes.
pub(crate) fn to_bytes(array: &DataArray, order: ByteOrder) -> Vec<u8> {
    let n = array.number_of_values();
    let mut out = Vec::with_capacity(n * array.scalar_type().size());
    with_buffer!(array.buffer(), v => {
        for &x in v.iter().take(n) {
            match order {
                ByteOrder::Little => x.extend_le_bytes(&mut out),
                ByteOrder::Big => x.extend_be_bytes(&mut out),
            }
        }
    });
    out
}

/// Build an array of `ty` from raw bytes. Trailing bytes that do not fill a value
/// are an error.
pub(crate) fn from_bytes(
    name: &str,
    ty: ScalarType,
    components: usize,
    bytes: &[u8],
    order: ByteOrder,
) -> Result<DataArray> {
    let size = ty.size();
    if bytes.len() % size != 0 {
        return Err(Error::file_format(format!(
            "{} bytes is not a whole number of {ty} values",
            bytes.len()
        )));
    }
    let mut array = with_storage!(ty.storage(), T => {
        let values: Vec<T> = bytes
            .chunks_exact(size)
            .map(|c| match order {
                ByteOrder::Little => T::from_le_slice(c),
                ByteOrder::Big => T::from_be_slice(c),
            })
            .collect();
        DataArray::from_vec(name, components, values)?
    });
    array.set_scalar_type_tag(ty)?;
    Ok(array)
}

/// Space separated values, `per_line` values to a line.
pub(crate) fn to_ascii(array: &DataArray, per_line: usize) -> String {
    let n = array.number_of_values();
    let mut out = String::with_capacity(n * 8);
    with_buffer!(array.buffer(), v => {
        for (i, &x) in v.iter().take(n).enumerate() {
            if i > 0 {
                out.push(if per_line > 0 && i % per_line == 0 { '\n' } else { ' ' });
            }
            x.push_ascii(&mut out);
        }
    });
    out
}

/// Parse `count` values of `ty` from `tokens`.
pub(crate) fn from_tokens<'a, I>(name: &str, ty: ScalarType, components: usize, count: usize, tokens: I) -> Result<DataArray>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens = tokens.into_iter();
    let mut array = with_storage!(ty.storage(), T => {
        let mut values: Vec<T> = Vec::with_capacity(count);
        for i in 0..count {
            let token = tokens
                .next()
                .ok_or_else(|| Error::file_format(format!("`{name}`: expected {count} values, found {i}")))?;
            let value = T::parse_ascii(token)
                .ok_or_else(|| Error::file_format(format!("`{name}`: `{token}` is not a {ty} value")))?;
            values.push(value);
        }
        DataArray::from_vec(name, components, values)?
    });
    array.set_scalar_type_tag(ty)?;
    Ok(array)
}

/// Bit values packed eight to a byte, most significant bit first.
pub(crate) fn pack_bits(array: &DataArray) -> Vec<u8> {
    let n = array.number_of_values();
    let mut out = vec![0u8; (n + 7) / 8];
    for i in 0..n {
        if array.value(i) != 0.0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

pub(crate) fn unpack_bits(name: &str, components: usize, count: usize, bytes: &[u8]) -> Result<DataArray> {
    if bytes.len() * 8 < count {
        return Err(Error::file_format(format!("`{name}`: truncated bit array")));
    }
    let values: Vec<u8> = (0..count).map(|i| (bytes[i / 8] >> (7 - i % 8)) & 1).collect();
    let mut array = DataArray::from_vec(name, components, values)?;
    array.set_scalar_type_tag(ScalarType::Bit)?;
    Ok(array)
}

/// Escape characters the whitespace separated legacy headers cannot hold.
pub(crate) fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '%' || c.is_whitespace() || c.is_control() {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn decode_name(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Integer array values as point or cell ids.
pub(crate) fn ids(array: &DataArray) -> Result<Vec<usize>> {
    (0..array.number_of_values())
        .map(|i| {
            array
                .integer_value(i)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| Error::file_format(format!("`{}` holds a negative or fractional id", array.name().unwrap_or_default())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_keep_type_tag() {
        let mut a = DataArray::from_tuples("ids", vec![[1i64, -2], [3, 4]]);
        a.set_scalar_type_tag(ScalarType::IdType).unwrap();
        let be = to_bytes(&a, ByteOrder::Big);
        assert_eq!(&be[..8], &1i64.to_be_bytes());
        let back = from_bytes("ids", ScalarType::IdType, 2, &be, ByteOrder::Big).unwrap();
        assert_eq!(back, a);
        assert_eq!(back.scalar_type(), ScalarType::IdType);
        assert!(from_bytes("x", ScalarType::Float, 1, &[0, 0, 0], ByteOrder::Little).is_err());
    }

    #[test]
    fn ascii_lines() {
        let a = DataArray::scalars("s", vec![1.5f32, 2.0, -3.25]);
        assert_eq!(to_ascii(&a, 2), "1.5 2.0\n-3.25");
        let back = from_tokens("s", ScalarType::Float, 1, 3, "1.5 2 -3.25".split_whitespace()).unwrap();
        assert_eq!(back, a);
        assert!(from_tokens("s", ScalarType::Int, 1, 2, ["1"]).is_err());
    }

    #[test]
    fn bits_pack_msb_first() {
        let mut a = DataArray::scalars("b", vec![1u8, 0, 1, 0, 0, 0, 0, 0, 1]);
        a.set_scalar_type_tag(ScalarType::Bit).unwrap();
        let packed = pack_bits(&a);
        assert_eq!(packed, vec![0b1010_0000, 0b1000_0000]);
        assert_eq!(unpack_bits("b", 1, 9, &packed).unwrap(), a);
    }

    #[test]
    fn names_escape_whitespace() {
        assert_eq!(encode_name("my field%"), "my%20field%25");
        assert_eq!(decode_name("my%20field%25"), "my field%");
        assert_eq!(decode_name("100%"), "100%");
    }
}
