use crate::encoding::{
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::{DecodeError, EncodeError};

/// Minimum number of octets needed to carry `value` as a BACnet unsigned.
pub const fn unsigned_len(value: u32) -> u32 {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Minimum number of octets needed to carry `value` in two's complement.
pub const fn signed_len(value: i32) -> u32 {
    match value {
        -128..=127 => 1,
        -32_768..=32_767 => 2,
        -8_388_608..=8_388_607 => 3,
        _ => 4,
    }
}

pub fn encode_unsigned(w: &mut Writer<'_>, value: u32) -> Result<u32, EncodeError> {
    let len = unsigned_len(value);
    w.write_all(&value.to_be_bytes()[4 - len as usize..])?;
    Ok(len)
}

pub fn decode_unsigned(r: &mut Reader<'_>, len: usize) -> Result<u32, DecodeError> {
    if len == 0 || len > 4 {
        return Err(DecodeError::Malformed);
    }
    let bytes = r.read_exact(len)?;
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

pub fn encode_signed(w: &mut Writer<'_>, value: i32) -> Result<u32, EncodeError> {
    let len = signed_len(value);
    w.write_all(&value.to_be_bytes()[4 - len as usize..])?;
    Ok(len)
}

pub fn decode_signed(r: &mut Reader<'_>, len: usize) -> Result<i32, DecodeError> {
    if len == 0 || len > 4 {
        return Err(DecodeError::Malformed);
    }
    let bytes = r.read_exact(len)?;
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut out = [fill; 4];
    out[4 - len..].copy_from_slice(bytes);
    Ok(i32::from_be_bytes(out))
}

fn encode_unsigned_tagged(w: &mut Writer<'_>, tag: Tag, value: u32) -> Result<(), EncodeError> {
    tag.encode(w)?;
    encode_unsigned(w, value).map(|_| ())
}

pub fn encode_app_unsigned(w: &mut Writer<'_>, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value);
    encode_unsigned_tagged(w, Tag::Application { tag: AppTag::UnsignedInt, len }, value)
}

pub fn encode_app_enumerated(w: &mut Writer<'_>, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value);
    encode_unsigned_tagged(w, Tag::Application { tag: AppTag::Enumerated, len }, value)
}

pub fn encode_app_signed(w: &mut Writer<'_>, value: i32) -> Result<(), EncodeError> {
    Tag::Application {
        tag: AppTag::SignedInt,
        len: signed_len(value),
    }
    .encode(w)?;
    encode_signed(w, value).map(|_| ())
}

pub fn encode_app_object_id(w: &mut Writer<'_>, object_id_raw: u32) -> Result<(), EncodeError> {
    Tag::Application {
        tag: AppTag::ObjectId,
        len: 4,
    }
    .encode(w)?;
    w.write_be_u32(object_id_raw)
}

pub fn encode_ctx_unsigned(w: &mut Writer<'_>, tag_num: u8, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value);
    encode_unsigned_tagged(w, Tag::Context { tag_num, len }, value)
}

pub fn encode_ctx_object_id(
    w: &mut Writer<'_>,
    tag_num: u8,
    object_id_raw: u32,
) -> Result<(), EncodeError> {
    Tag::Context { tag_num, len: 4 }.encode(w)?;
    w.write_be_u32(object_id_raw)
}

/// Reads an application tag of the expected kind and returns its length.
fn expect_app(r: &mut Reader<'_>, expected: AppTag) -> Result<usize, DecodeError> {
    match Tag::decode(r)? {
        Tag::Application { tag, len } if tag == expected => Ok(len as usize),
        _ => Err(DecodeError::Malformed),
    }
}

pub fn decode_app_unsigned(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let len = expect_app(r, AppTag::UnsignedInt)?;
    decode_unsigned(r, len)
}

pub fn decode_app_enumerated(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let len = expect_app(r, AppTag::Enumerated)?;
    decode_unsigned(r, len)
}

pub fn decode_app_signed(r: &mut Reader<'_>) -> Result<i32, DecodeError> {
    let len = expect_app(r, AppTag::SignedInt)?;
    decode_signed(r, len)
}

pub fn decode_app_object_id(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    match expect_app(r, AppTag::ObjectId)? {
        4 => r.read_be_u32(),
        _ => Err(DecodeError::Malformed),
    }
}

/// Decodes context tag `tag_num` holding an unsigned (or enumerated) value.
pub fn decode_ctx_unsigned(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    let len = Tag::expect_context(r, tag_num)?;
    decode_unsigned(r, len)
}

/// Decodes context tag `tag_num` holding a packed object identifier.
pub fn decode_ctx_object_id(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    match Tag::expect_context(r, tag_num)? {
        4 => r.read_be_u32(),
        _ => Err(DecodeError::Malformed),
    }
}

/// Decodes context tag `tag_num` if it is next, leaving `r` untouched otherwise.
pub fn decode_optional_ctx_unsigned(
    r: &mut Reader<'_>,
    tag_num: u8,
) -> Result<Option<u32>, DecodeError> {
    if Tag::next_is_context(r, tag_num) {
        decode_ctx_unsigned(r, tag_num).map(Some)
    } else {
        Ok(None)
    }
}

pub fn encode_opening_tag(w: &mut Writer<'_>, tag_num: u8) -> Result<(), EncodeError> {
    Tag::Opening { tag_num }.encode(w)
}

pub fn encode_closing_tag(w: &mut Writer<'_>, tag_num: u8) -> Result<(), EncodeError> {
    Tag::Closing { tag_num }.encode(w)
}
