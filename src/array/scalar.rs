use super::Buffer;

use std::fmt;
use std::sync::Arc;

/// Element type tag of a [`DataArray`](super::DataArray).
///
/// Several tags share a storage type (e.g. `Long`, `LongLong` and `IdType` are all
/// stored as `i64`); the tag is kept so writers can emit the same type name back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bit,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    IdType,
    Float,
    Double,
}

/// The physical storage used for a [`ScalarType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    pub fn storage(&self) -> Storage {
        match self {
            Self::Bit | Self::UnsignedChar => Storage::U8,
            Self::Char | Self::SignedChar => Storage::I8,
            Self::Short => Storage::I16,
            Self::UnsignedShort => Storage::U16,
            Self::Int => Storage::I32,
            Self::UnsignedInt => Storage::U32,
            Self::Long | Self::LongLong | Self::IdType => Storage::I64,
            Self::UnsignedLong | Self::UnsignedLongLong => Storage::U64,
            Self::Float => Storage::F32,
            Self::Double => Storage::F64,
        }
    }

    /// size of one value in bytes as stored on disk
    pub fn size(&self) -> usize {
        match self.storage() {
            Storage::I8 | Storage::U8 => 1,
            Storage::I16 | Storage::U16 => 2,
            Storage::I32 | Storage::U32 | Storage::F32 => 4,
            Storage::I64 | Storage::U64 | Storage::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self.storage(),
            Storage::I8 | Storage::I16 | Storage::I32 | Storage::I64 | Storage::F32 | Storage::F64
        )
    }

    /// type keyword used by the legacy file format
    pub fn legacy_name(&self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Char => "char",
            Self::SignedChar => "signed_char",
            Self::UnsignedChar => "unsigned_char",
            Self::Short => "short",
            Self::UnsignedShort => "unsigned_short",
            Self::Int => "int",
            Self::UnsignedInt => "unsigned_int",
            Self::Long => "long",
            Self::UnsignedLong => "unsigned_long",
            Self::LongLong => "vtktypeint64",
            Self::UnsignedLongLong => "vtktypeuint64",
            Self::IdType => "vtkIdType",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn from_legacy_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let ty = match lower.as_str() {
            "bit" => Self::Bit,
            "char" => Self::Char,
            "signed_char" => Self::SignedChar,
            "unsigned_char" => Self::UnsignedChar,
            "short" => Self::Short,
            "unsigned_short" => Self::UnsignedShort,
            "int" => Self::Int,
            "unsigned_int" => Self::UnsignedInt,
            "long" => Self::Long,
            "unsigned_long" => Self::UnsignedLong,
            "vtktypeint64" => Self::LongLong,
            "vtktypeuint64" => Self::UnsignedLongLong,
            "vtkidtype" => Self::IdType,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return None,
        };
        Some(ty)
    }

    /// type attribute used by the XML file formats
    pub fn xml_name(&self) -> &'static str {
        match self {
            Self::Bit => "Bit",
            Self::Char | Self::SignedChar => "Int8",
            Self::UnsignedChar => "UInt8",
            Self::Short => "Int16",
            Self::UnsignedShort => "UInt16",
            Self::Int => "Int32",
            Self::UnsignedInt => "UInt32",
            Self::Long | Self::LongLong | Self::IdType => "Int64",
            Self::UnsignedLong | Self::UnsignedLongLong => "UInt64",
            Self::Float => "Float32",
            Self::Double => "Float64",
        }
    }

    pub fn from_xml_name(name: &str) -> Option<Self> {
        let ty = match name {
            "Bit" => Self::Bit,
            "Int8" => Self::Char,
            "UInt8" => Self::UnsignedChar,
            "Int16" => Self::Short,
            "UInt16" => Self::UnsignedShort,
            "Int32" => Self::Int,
            "UInt32" => Self::UnsignedInt,
            "Int64" => Self::LongLong,
            "UInt64" => Self::UnsignedLongLong,
            "Float32" => Self::Float,
            "Float64" => Self::Double,
            _ => return None,
        };
        Some(ty)
    }

    /// the canonical tag for a storage type
    pub fn from_storage(storage: Storage) -> Self {
        match storage {
            Storage::I8 => Self::SignedChar,
            Storage::U8 => Self::UnsignedChar,
            Storage::I16 => Self::Short,
            Storage::U16 => Self::UnsignedShort,
            Storage::I32 => Self::Int,
            Storage::U32 => Self::UnsignedInt,
            Storage::I64 => Self::LongLong,
            Storage::U64 => Self::UnsignedLongLong,
            Storage::F32 => Self::Float,
            Storage::F64 => Self::Double,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.legacy_name())
    }
}

/// Rust element types that can back a data array.
pub trait Scalar:
    Copy
    + Send
    + Sync
    + Default
    + PartialOrd
    + fmt::Debug
    + num_traits::NumCast
    + num_traits::Bounded
    + 'static
{
    /// canonical tag for this storage type
    const NATIVE: ScalarType;

    fn as_f64(self) -> f64;

    /// saturating conversion, NaN becomes zero for integer types
    fn from_f64(value: f64) -> Self;

    /// exact integer value, `None` for floating point types
    fn as_i128(self) -> Option<i128>;

    /// two's complement truncation of an integer, rounding for floating point types
    fn from_i128_wrapping(value: i128) -> Self;

    fn wrap(data: Arc<Vec<Self>>) -> Buffer;
    fn view(buffer: &Buffer) -> Option<&Arc<Vec<Self>>>;

    fn extend_le_bytes(self, out: &mut Vec<u8>);
    fn extend_be_bytes(self, out: &mut Vec<u8>);
    fn from_le_slice(bytes: &[u8]) -> Self;
    fn from_be_slice(bytes: &[u8]) -> Self;

    /// text representation used by the ascii writers
    fn push_ascii(self, out: &mut String);
    fn parse_ascii(token: &str) -> Option<Self>;
}

macro_rules! integer_scalar {
    ($t:ty, $variant:ident, $native:ident) => {
        impl Scalar for $t {
            const NATIVE: ScalarType = ScalarType::$native;

            fn as_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                // `as` saturates and maps NaN to 0
                value as $t
            }

            fn as_i128(self) -> Option<i128> {
                Some(self as i128)
            }

            fn from_i128_wrapping(value: i128) -> Self {
                value as $t
            }

            fn wrap(data: Arc<Vec<Self>>) -> Buffer {
                Buffer::$variant(data)
            }

            fn view(buffer: &Buffer) -> Option<&Arc<Vec<Self>>> {
                match buffer {
                    Buffer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn extend_le_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes())
            }

            fn extend_be_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes())
            }

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut arr = [0u8; std::mem::size_of::<$t>()];
                arr.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(arr)
            }

            fn from_be_slice(bytes: &[u8]) -> Self {
                let mut arr = [0u8; std::mem::size_of::<$t>()];
                arr.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_be_bytes(arr)
            }

            fn push_ascii(self, out: &mut String) {
                out.push_str(&self.to_string())
            }

            fn parse_ascii(token: &str) -> Option<Self> {
                token.parse::<$t>().ok().or_else(|| {
                    // some writers emit integral values as `3.0`
                    token.parse::<f64>().ok().map(<$t as Scalar>::from_f64)
                })
            }
        }
    };
}

macro_rules! float_scalar {
    ($t:ty, $variant:ident, $native:ident) => {
        impl Scalar for $t {
            const NATIVE: ScalarType = ScalarType::$native;

            fn as_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn as_i128(self) -> Option<i128> {
                None
            }

            fn from_i128_wrapping(value: i128) -> Self {
                value as $t
            }

            fn wrap(data: Arc<Vec<Self>>) -> Buffer {
                Buffer::$variant(data)
            }

            fn view(buffer: &Buffer) -> Option<&Arc<Vec<Self>>> {
                match buffer {
                    Buffer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn extend_le_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes())
            }

            fn extend_be_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes())
            }

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut arr = [0u8; std::mem::size_of::<$t>()];
                arr.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(arr)
            }

            fn from_be_slice(bytes: &[u8]) -> Self {
                let mut arr = [0u8; std::mem::size_of::<$t>()];
                arr.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_be_bytes(arr)
            }

            fn push_ascii(self, out: &mut String) {
                if self.is_nan() {
                    out.push_str("nan");
                } else if self.is_infinite() {
                    out.push_str(if self > 0.0 { "inf" } else { "-inf" });
                } else {
                    let mut buffer = ryu::Buffer::new();
                    out.push_str(buffer.format_finite(self));
                }
            }

            fn parse_ascii(token: &str) -> Option<Self> {
                match token.to_ascii_lowercase().as_str() {
                    "nan" | "-nan" => Some(<$t>::NAN),
                    "inf" | "infinity" => Some(<$t>::INFINITY),
                    "-inf" | "-infinity" => Some(<$t>::NEG_INFINITY),
                    _ => token.parse::<$t>().ok(),
                }
            }
        }
    };
}

integer_scalar!(i8, I8, SignedChar);
integer_scalar!(u8, U8, UnsignedChar);
integer_scalar!(i16, I16, Short);
integer_scalar!(u16, U16, UnsignedShort);
integer_scalar!(i32, I32, Int);
integer_scalar!(u32, U32, UnsignedInt);
integer_scalar!(i64, I64, LongLong);
integer_scalar!(u64, U64, UnsignedLongLong);
float_scalar!(f32, F32, Float);
float_scalar!(f64, F64, Double);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_names_round_trip() {
        for ty in [
            ScalarType::Bit,
            ScalarType::UnsignedChar,
            ScalarType::Short,
            ScalarType::Int,
            ScalarType::LongLong,
            ScalarType::Float,
            ScalarType::Double,
        ] {
            assert_eq!(ScalarType::from_legacy_name(ty.legacy_name()), Some(ty));
        }
    }

    #[test]
    fn integer_conversions_saturate_and_wrap() {
        assert_eq!(<u8 as Scalar>::from_f64(300.0), 255);
        assert_eq!(<i16 as Scalar>::from_f64(f64::NAN), 0);
        assert_eq!(<u8 as Scalar>::from_i128_wrapping(257), 1);
        assert_eq!(<u16 as Scalar>::from_i128_wrapping(-1), u16::MAX);
    }

    #[test]
    fn ascii_float_formatting() {
        let mut s = String::new();
        0.1f64.push_ascii(&mut s);
        assert_eq!(s, "0.1");
        assert_eq!(<f64 as Scalar>::parse_ascii("nan").map(f64::is_nan), Some(true));
        assert_eq!(<i32 as Scalar>::parse_ascii("7"), Some(7));
    }
}
