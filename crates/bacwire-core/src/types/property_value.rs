use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::types::{Date, ObjectId, Time};

/// A BACnet bit string: packed bits plus the count of unused trailing bits
/// in the last octet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitString {
    pub unused_bits: u8,
    pub data: Vec<u8>,
}

impl BitString {
    pub fn new(unused_bits: u8, data: Vec<u8>) -> Self {
        Self { unused_bits, data }
    }

    pub fn bit_len(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.unused_bits as usize)
    }

    /// Bit `index`, counting from the most significant bit of the first octet.
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len() {
            return None;
        }
        Some(self.data[index / 8] & (0x80 >> (index % 8)) != 0)
    }
}

/// An application-tagged BACnet value.
///
/// `Sequence` holds a property whose payload is several application values,
/// such as a priority array or object list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(String),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectId(ObjectId),
    Sequence(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Numeric view of the value, for point reads that only care about magnitude.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Unsigned(v) | Self::Enumerated(v) => Some(*v as f64),
            Self::Signed(v) => Some(*v as f64),
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::CharacterString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u32> {
        match self {
            Self::Unsigned(v) | Self::Enumerated(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Self::CharacterString(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Real(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Unsigned(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Signed(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::CharacterString(value.into())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::CharacterString(value)
    }
}

impl From<ObjectId> for PropertyValue {
    fn from(value: ObjectId) -> Self {
        Self::ObjectId(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::OctetString(v) => {
                for b in v {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
            Self::CharacterString(v) => write!(f, "{v:?}"),
            Self::BitString(v) => {
                for i in 0..v.bit_len() {
                    f.write_str(if v.bit(i) == Some(true) { "1" } else { "0" })?;
                }
                Ok(())
            }
            Self::Enumerated(v) => write!(f, "enum({v})"),
            Self::Date(d) => write!(
                f,
                "{}-{:02}-{:02}",
                1900 + d.year_since_1900 as u16,
                d.month,
                d.day
            ),
            Self::Time(t) => write!(
                f,
                "{:02}:{:02}:{:02}.{:02}",
                t.hour, t.minute, t.second, t.hundredths
            ),
            Self::ObjectId(id) => write!(f, "{id}"),
            Self::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}
