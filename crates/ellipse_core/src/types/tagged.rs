//! # Tagged Values
//!
//! A value from a fixed set of primitive types together with its runtime type
//! tag. In memory a value is a [`TaggedElement`]: a 16-byte little-endian
//! payload, the tag byte and padding, 32 bytes in all.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::error::MemoryError;

/// Runtime type discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// `i8`.
    I8 = 0,
    /// `u8`.
    U8 = 1,
    /// `i16`.
    I16 = 2,
    /// `u16`.
    U16 = 3,
    /// `i32`.
    I32 = 4,
    /// `u32`.
    U32 = 5,
    /// `i64`.
    I64 = 6,
    /// `u64`.
    U64 = 7,
    /// `i128`.
    I128 = 8,
    /// `u128`.
    U128 = 9,
    /// `f32`.
    F32 = 10,
    /// `f64`.
    F64 = 11,
    /// IEEE binary128, carried as raw bits.
    F128 = 12,
    /// Widest signed integer (`i128`).
    IMax = 13,
    /// Widest unsigned integer (`u128`).
    UMax = 14,
    /// Widest native float (`f64`).
    FMax = 15,
    /// Machine address.
    Ptr = 16,
}

impl TypeTag {
    /// Every tag, in discriminant order.
    pub const ALL: [Self; 17] = [
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::I128,
        Self::U128,
        Self::F32,
        Self::F64,
        Self::F128,
        Self::IMax,
        Self::UMax,
        Self::FMax,
        Self::Ptr,
    ];

    /// Size in bytes of a value of this type.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 | Self::FMax => 8,
            Self::I128 | Self::U128 | Self::F128 | Self::IMax | Self::UMax => 16,
            Self::Ptr => std::mem::size_of::<usize>(),
        }
    }

    /// Lowercase type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::I128 => "i128",
            Self::U128 => "u128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::F128 => "f128",
            Self::IMax => "imax",
            Self::UMax => "umax",
            Self::FMax => "fmax",
            Self::Ptr => "ptr",
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = MemoryError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .ok_or(MemoryError::InvalidTag(raw))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value and its type. Only the payload matching the tag exists.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TaggedValue {
    /// `i8`.
    I8(i8),
    /// `u8`.
    U8(u8),
    /// `i16`.
    I16(i16),
    /// `u16`.
    U16(u16),
    /// `i32`.
    I32(i32),
    /// `u32`.
    U32(u32),
    /// `i64`.
    I64(i64),
    /// `u64`.
    U64(u64),
    /// `i128`.
    I128(i128),
    /// `u128`.
    U128(u128),
    /// `f32`.
    F32(f32),
    /// `f64`.
    F64(f64),
    /// IEEE binary128 bit pattern.
    F128(u128),
    /// Widest signed integer.
    IMax(i128),
    /// Widest unsigned integer.
    UMax(u128),
    /// Widest native float.
    FMax(f64),
    /// Address.
    Ptr(usize),
}

impl TaggedValue {
    /// The runtime tag of this value.
    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        match self {
            Self::I8(_) => TypeTag::I8,
            Self::U8(_) => TypeTag::U8,
            Self::I16(_) => TypeTag::I16,
            Self::U16(_) => TypeTag::U16,
            Self::I32(_) => TypeTag::I32,
            Self::U32(_) => TypeTag::U32,
            Self::I64(_) => TypeTag::I64,
            Self::U64(_) => TypeTag::U64,
            Self::I128(_) => TypeTag::I128,
            Self::U128(_) => TypeTag::U128,
            Self::F32(_) => TypeTag::F32,
            Self::F64(_) => TypeTag::F64,
            Self::F128(_) => TypeTag::F128,
            Self::IMax(_) => TypeTag::IMax,
            Self::UMax(_) => TypeTag::UMax,
            Self::FMax(_) => TypeTag::FMax,
            Self::Ptr(_) => TypeTag::Ptr,
        }
    }

    /// Packs the value into its storage record.
    #[must_use]
    pub fn to_element(&self) -> TaggedElement {
        let mut payload = [0u8; PAYLOAD_LEN];
        let mut put = |bytes: &[u8]| payload[..bytes.len()].copy_from_slice(bytes);
        match *self {
            Self::I8(v) => put(&v.to_le_bytes()),
            Self::U8(v) => put(&v.to_le_bytes()),
            Self::I16(v) => put(&v.to_le_bytes()),
            Self::U16(v) => put(&v.to_le_bytes()),
            Self::I32(v) => put(&v.to_le_bytes()),
            Self::U32(v) => put(&v.to_le_bytes()),
            Self::I64(v) => put(&v.to_le_bytes()),
            Self::U64(v) => put(&v.to_le_bytes()),
            Self::I128(v) | Self::IMax(v) => put(&v.to_le_bytes()),
            Self::U128(v) | Self::F128(v) | Self::UMax(v) => put(&v.to_le_bytes()),
            Self::F32(v) => put(&v.to_le_bytes()),
            Self::F64(v) | Self::FMax(v) => put(&v.to_le_bytes()),
            Self::Ptr(v) => put(&v.to_le_bytes()),
        }
        TaggedElement {
            payload,
            tag: self.tag() as u8,
            _padding: [0; 15],
        }
    }
}

macro_rules! from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TaggedValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

from_primitive! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    i128 => I128,
    u128 => U128,
    f32 => F32,
    f64 => F64,
    usize => Ptr,
}

const PAYLOAD_LEN: usize = 16;
const PTR_LEN: usize = std::mem::size_of::<usize>();

/// Storage record of a [`TaggedValue`].
///
/// Layout: bytes 0..16 payload (little-endian, zero-extended), byte 16 tag,
/// bytes 17..32 padding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TaggedElement {
    /// Value bytes.
    pub payload: [u8; PAYLOAD_LEN],
    /// Raw [`TypeTag`].
    pub tag: u8,
    /// Padding to 32 bytes.
    pub _padding: [u8; 15],
}

impl TaggedElement {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Decoded tag.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidTag`] for a byte outside the tag set.
    pub fn type_tag(&self) -> Result<TypeTag, MemoryError> {
        TypeTag::try_from(self.tag)
    }

    /// Unpacks the value.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidTag`] for a byte outside the tag set.
    pub fn value(&self) -> Result<TaggedValue, MemoryError> {
        let p = &self.payload;
        let b1 = [p[0]];
        let b2 = [p[0], p[1]];
        let b4 = [p[0], p[1], p[2], p[3]];
        let b8 = [p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]];
        let ptr = {
            let mut raw = [0u8; PTR_LEN];
            raw.copy_from_slice(&p[..PTR_LEN]);
            usize::from_le_bytes(raw)
        };

        Ok(match self.type_tag()? {
            TypeTag::I8 => TaggedValue::I8(i8::from_le_bytes(b1)),
            TypeTag::U8 => TaggedValue::U8(u8::from_le_bytes(b1)),
            TypeTag::I16 => TaggedValue::I16(i16::from_le_bytes(b2)),
            TypeTag::U16 => TaggedValue::U16(u16::from_le_bytes(b2)),
            TypeTag::I32 => TaggedValue::I32(i32::from_le_bytes(b4)),
            TypeTag::U32 => TaggedValue::U32(u32::from_le_bytes(b4)),
            TypeTag::I64 => TaggedValue::I64(i64::from_le_bytes(b8)),
            TypeTag::U64 => TaggedValue::U64(u64::from_le_bytes(b8)),
            TypeTag::I128 => TaggedValue::I128(i128::from_le_bytes(*p)),
            TypeTag::U128 => TaggedValue::U128(u128::from_le_bytes(*p)),
            TypeTag::F32 => TaggedValue::F32(f32::from_le_bytes(b4)),
            TypeTag::F64 => TaggedValue::F64(f64::from_le_bytes(b8)),
            TypeTag::F128 => TaggedValue::F128(u128::from_le_bytes(*p)),
            TypeTag::IMax => TaggedValue::IMax(i128::from_le_bytes(*p)),
            TypeTag::UMax => TaggedValue::UMax(u128::from_le_bytes(*p)),
            TypeTag::FMax => TaggedValue::FMax(f64::from_le_bytes(b8)),
            TypeTag::Ptr => TaggedValue::Ptr(ptr),
        })
    }
}

impl From<TaggedValue> for TaggedElement {
    fn from(value: TaggedValue) -> Self {
        value.to_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_is_32_bytes() {
        assert_eq!(TaggedElement::SIZE, 32);
        assert_eq!(4096 / TaggedElement::SIZE, 128);
    }

    #[test]
    fn test_tag_bytes() {
        for (i, tag) in TypeTag::ALL.iter().enumerate() {
            assert_eq!(*tag as usize, i);
            assert_eq!(TypeTag::try_from(i as u8).unwrap(), *tag);
        }
        assert_eq!(TypeTag::try_from(17), Err(MemoryError::InvalidTag(17)));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(TypeTag::I8.size(), 1);
        assert_eq!(TypeTag::U16.size(), 2);
        assert_eq!(TypeTag::F32.size(), 4);
        assert_eq!(TypeTag::FMax.size(), 8);
        assert_eq!(TypeTag::F128.size(), 16);
        assert_eq!(TypeTag::Ptr.size(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_values_survive_storage() {
        let values = [
            TaggedValue::I8(-5),
            TaggedValue::U16(65_000),
            TaggedValue::I64(i64::MIN),
            TaggedValue::U128(u128::MAX - 3),
            TaggedValue::F32(1.5),
            TaggedValue::FMax(-0.25),
            TaggedValue::IMax(-1),
            TaggedValue::Ptr(0xDEAD_BEEF),
        ];
        for value in values {
            let element = value.to_element();
            assert_eq!(element.tag, value.tag() as u8);
            assert_eq!(element.value().unwrap(), value);
        }
    }

    #[test]
    fn test_ptr_uses_full_pointer_width() {
        let element = TaggedValue::Ptr(usize::MAX).to_element();
        assert!(element.payload[..PTR_LEN].iter().all(|&b| b == 0xFF));
        assert!(element.payload[PTR_LEN..].iter().all(|&b| b == 0));
        assert_eq!(element.value().unwrap(), TaggedValue::Ptr(usize::MAX));
    }

    #[test]
    fn test_payload_is_zero_extended() {
        let element = TaggedValue::I8(-1).to_element();
        assert_eq!(element.payload[0], 0xFF);
        assert!(element.payload[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut element = TaggedValue::U8(1).to_element();
        element.tag = 200;
        assert_eq!(element.value(), Err(MemoryError::InvalidTag(200)));
    }

    #[test]
    fn test_from_primitive() {
        assert_eq!(TaggedValue::from(7u32), TaggedValue::U32(7));
        assert_eq!(TaggedValue::from(2.0f64).tag(), TypeTag::F64);
    }
}
