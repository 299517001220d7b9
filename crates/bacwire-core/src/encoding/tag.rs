use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

const CONTEXT_CLASS: u8 = 0b0000_1000;
const EXTENDED_TAG_NUMBER: u8 = 0x0F;
const EXTENDED_LENGTH: u8 = 5;
const OPENING: u8 = 6;
const CLOSING: u8 = 7;

/// Application tag numbers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectId = 12,
}

impl AppTag {
    /// Tags 13 to 15 are reserved and rejected as malformed.
    pub fn from_u8(value: u8) -> Result<Self, DecodeError> {
        Ok(match value {
            0 => Self::Null,
            1 => Self::Boolean,
            2 => Self::UnsignedInt,
            3 => Self::SignedInt,
            4 => Self::Real,
            5 => Self::Double,
            6 => Self::OctetString,
            7 => Self::CharacterString,
            8 => Self::BitString,
            9 => Self::Enumerated,
            10 => Self::Date,
            11 => Self::Time,
            12 => Self::ObjectId,
            _ => return Err(DecodeError::Malformed),
        })
    }
}

/// A decoded tag header.
///
/// `len` is the declared content length, except for application booleans
/// where the length field carries the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Application { tag: AppTag, len: u32 },
    Context { tag_num: u8, len: u32 },
    Opening { tag_num: u8 },
    Closing { tag_num: u8 },
}

impl Tag {
    pub fn encode(self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Tag::Application { tag, len } => encode_header(w, tag as u8, 0, len),
            Tag::Context { tag_num, len } => encode_header(w, tag_num, CONTEXT_CLASS, len),
            Tag::Opening { tag_num } => encode_delimiter(w, tag_num, OPENING),
            Tag::Closing { tag_num } => encode_delimiter(w, tag_num, CLOSING),
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let first = r.read_u8()?;
        let context = first & CONTEXT_CLASS != 0;

        let mut tag_num = first >> 4;
        if tag_num == EXTENDED_TAG_NUMBER {
            tag_num = r.read_u8()?;
        }

        let len_code = first & 0x07;
        if context {
            match len_code {
                OPENING => return Ok(Tag::Opening { tag_num }),
                CLOSING => return Ok(Tag::Closing { tag_num }),
                _ => {}
            }
        } else if len_code > EXTENDED_LENGTH {
            return Err(DecodeError::Malformed);
        }

        let len = decode_len(r, len_code)?;
        if context {
            Ok(Tag::Context { tag_num, len })
        } else {
            Ok(Tag::Application {
                tag: AppTag::from_u8(tag_num)?,
                len,
            })
        }
    }

    /// Decodes the next tag without advancing `r`.
    pub fn peek(r: &Reader<'_>) -> Result<Self, DecodeError> {
        let mut probe = *r;
        Self::decode(&mut probe)
    }

    /// Reads a context tag with the given number and returns its length.
    pub fn expect_context(r: &mut Reader<'_>, tag_num: u8) -> Result<usize, DecodeError> {
        match Self::decode(r)? {
            Tag::Context { tag_num: n, len } if n == tag_num => Ok(len as usize),
            _ => Err(DecodeError::Malformed),
        }
    }

    pub fn expect_opening(r: &mut Reader<'_>, tag_num: u8) -> Result<(), DecodeError> {
        match Self::decode(r)? {
            Tag::Opening { tag_num: n } if n == tag_num => Ok(()),
            _ => Err(DecodeError::Malformed),
        }
    }

    pub fn expect_closing(r: &mut Reader<'_>, tag_num: u8) -> Result<(), DecodeError> {
        match Self::decode(r)? {
            Tag::Closing { tag_num: n } if n == tag_num => Ok(()),
            _ => Err(DecodeError::Malformed),
        }
    }

    /// True when the next tag is context tag `tag_num` carrying data.
    pub fn next_is_context(r: &Reader<'_>, tag_num: u8) -> bool {
        matches!(Self::peek(r), Ok(Tag::Context { tag_num: n, .. }) if n == tag_num)
    }
}

fn write_tag_byte(w: &mut Writer<'_>, tag_num: u8, low_bits: u8) -> Result<(), EncodeError> {
    if tag_num < EXTENDED_TAG_NUMBER {
        w.write_u8((tag_num << 4) | low_bits)
    } else {
        w.write_u8((EXTENDED_TAG_NUMBER << 4) | low_bits)?;
        w.write_u8(tag_num)
    }
}

fn encode_header(w: &mut Writer<'_>, tag_num: u8, class: u8, len: u32) -> Result<(), EncodeError> {
    if len <= 4 {
        return write_tag_byte(w, tag_num, class | len as u8);
    }
    write_tag_byte(w, tag_num, class | EXTENDED_LENGTH)?;
    match len {
        5..=253 => w.write_u8(len as u8),
        254..=0xFFFF => {
            w.write_u8(254)?;
            w.write_be_u16(len as u16)
        }
        _ => {
            w.write_u8(255)?;
            w.write_be_u32(len)
        }
    }
}

fn encode_delimiter(w: &mut Writer<'_>, tag_num: u8, kind: u8) -> Result<(), EncodeError> {
    write_tag_byte(w, tag_num, CONTEXT_CLASS | kind)
}

fn decode_len(r: &mut Reader<'_>, len_code: u8) -> Result<u32, DecodeError> {
    match len_code {
        0..=4 => Ok(len_code as u32),
        EXTENDED_LENGTH => match r.read_u8()? {
            254 => r.read_be_u16().map(u32::from),
            255 => r.read_be_u32(),
            short => Ok(short as u32),
        },
        _ => Err(DecodeError::Malformed),
    }
}
