use alloc::string::String;
use alloc::vec::Vec;

use crate::encoding::{
    primitives::{
        decode_signed, decode_unsigned, encode_app_enumerated, encode_app_object_id,
        encode_app_signed, encode_app_unsigned, encode_closing_tag, encode_opening_tag,
    },
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::types::{BitString, Date, ObjectId, PropertyValue, Time};
use crate::{DecodeError, EncodeError};

/// Character set 0: ANSI X3.4 / UTF-8.
const CHARSET_UTF8: u8 = 0;

fn u32_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::ValueOutOfRange)
}

fn encode_fixed(w: &mut Writer<'_>, tag: AppTag, bytes: &[u8]) -> Result<(), EncodeError> {
    Tag::Application {
        tag,
        len: u32_len(bytes.len())?,
    }
    .encode(w)?;
    w.write_all(bytes)
}

/// Writes one application-tagged value. A [`PropertyValue::Sequence`] is
/// written as its elements back to back.
pub fn encode_application_value(w: &mut Writer<'_>, value: &PropertyValue) -> Result<(), EncodeError> {
    match value {
        PropertyValue::Null => Tag::Application {
            tag: AppTag::Null,
            len: 0,
        }
        .encode(w),
        PropertyValue::Boolean(v) => Tag::Application {
            tag: AppTag::Boolean,
            len: u32::from(*v),
        }
        .encode(w),
        PropertyValue::Unsigned(v) => encode_app_unsigned(w, *v),
        PropertyValue::Signed(v) => encode_app_signed(w, *v),
        PropertyValue::Real(v) => encode_fixed(w, AppTag::Real, &v.to_bits().to_be_bytes()),
        PropertyValue::Double(v) => encode_fixed(w, AppTag::Double, &v.to_bits().to_be_bytes()),
        PropertyValue::OctetString(v) => encode_fixed(w, AppTag::OctetString, v),
        PropertyValue::CharacterString(v) => {
            Tag::Application {
                tag: AppTag::CharacterString,
                len: u32_len(v.len().saturating_add(1))?,
            }
            .encode(w)?;
            w.write_u8(CHARSET_UTF8)?;
            w.write_all(v.as_bytes())
        }
        PropertyValue::BitString(v) => {
            if v.unused_bits > 7 || (v.data.is_empty() && v.unused_bits != 0) {
                return Err(EncodeError::ValueOutOfRange);
            }
            Tag::Application {
                tag: AppTag::BitString,
                len: u32_len(v.data.len().saturating_add(1))?,
            }
            .encode(w)?;
            w.write_u8(v.unused_bits)?;
            w.write_all(&v.data)
        }
        PropertyValue::Enumerated(v) => encode_app_enumerated(w, *v),
        PropertyValue::Date(v) => encode_fixed(w, AppTag::Date, &v.to_bytes()),
        PropertyValue::Time(v) => encode_fixed(w, AppTag::Time, &v.to_bytes()),
        PropertyValue::ObjectId(v) => encode_app_object_id(w, v.raw()),
        PropertyValue::Sequence(items) => {
            for item in items {
                if matches!(item, PropertyValue::Sequence(_)) {
                    return Err(EncodeError::Unsupported);
                }
                encode_application_value(w, item)?;
            }
            Ok(())
        }
    }
}

/// Writes `value` wrapped in opening/closing context tag `tag_num`.
pub fn encode_property_payload(
    w: &mut Writer<'_>,
    tag_num: u8,
    value: &PropertyValue,
) -> Result<(), EncodeError> {
    encode_opening_tag(w, tag_num)?;
    encode_application_value(w, value)?;
    encode_closing_tag(w, tag_num)
}

/// Reads the values between an already-consumed opening tag and its closing
/// tag `tag_num`. One value decodes as itself, any other count as a
/// [`PropertyValue::Sequence`]. Constructed (context-tagged) content is
/// well formed but unsupported.
pub fn decode_property_payload(r: &mut Reader<'_>, tag_num: u8) -> Result<PropertyValue, DecodeError> {
    let mut values = Vec::new();
    loop {
        match Tag::decode(r)? {
            Tag::Closing { tag_num: n } if n == tag_num => break,
            Tag::Closing { .. } => return Err(DecodeError::Malformed),
            Tag::Context { .. } | Tag::Opening { .. } => return Err(DecodeError::Unsupported),
            tag @ Tag::Application { .. } => values.push(decode_application_value_from_tag(r, tag)?),
        }
    }
    if values.len() == 1 {
        Ok(values.remove(0))
    } else {
        Ok(PropertyValue::Sequence(values))
    }
}

pub fn decode_application_value(r: &mut Reader<'_>) -> Result<PropertyValue, DecodeError> {
    let tag = Tag::decode(r)?;
    decode_application_value_from_tag(r, tag)
}

fn read_array<const N: usize>(r: &mut Reader<'_>, len: u32) -> Result<[u8; N], DecodeError> {
    if len as usize != N {
        return Err(DecodeError::Malformed);
    }
    let mut out = [0u8; N];
    out.copy_from_slice(r.read_exact(N)?);
    Ok(out)
}

pub fn decode_application_value_from_tag(
    r: &mut Reader<'_>,
    tag: Tag,
) -> Result<PropertyValue, DecodeError> {
    let Tag::Application { tag, len } = tag else {
        return Err(DecodeError::Malformed);
    };
    let value = match tag {
        AppTag::Null if len == 0 => PropertyValue::Null,
        AppTag::Boolean if len <= 1 => PropertyValue::Boolean(len == 1),
        AppTag::Null | AppTag::Boolean => return Err(DecodeError::Malformed),
        AppTag::UnsignedInt => PropertyValue::Unsigned(decode_unsigned(r, len as usize)?),
        AppTag::SignedInt => PropertyValue::Signed(decode_signed(r, len as usize)?),
        AppTag::Real => PropertyValue::Real(f32::from_be_bytes(read_array(r, len)?)),
        AppTag::Double => PropertyValue::Double(f64::from_be_bytes(read_array(r, len)?)),
        AppTag::OctetString => PropertyValue::OctetString(r.read_exact(len as usize)?.to_vec()),
        AppTag::CharacterString => {
            let raw = r.read_exact(len as usize)?;
            let (&charset, text) = raw.split_first().ok_or(DecodeError::Malformed)?;
            if charset != CHARSET_UTF8 {
                return Err(DecodeError::Unsupported);
            }
            let text = core::str::from_utf8(text).map_err(|_| DecodeError::Malformed)?;
            PropertyValue::CharacterString(String::from(text))
        }
        AppTag::BitString => {
            let raw = r.read_exact(len as usize)?;
            let (&unused_bits, data) = raw.split_first().ok_or(DecodeError::Malformed)?;
            if unused_bits > 7 {
                return Err(DecodeError::Malformed);
            }
            PropertyValue::BitString(BitString::new(unused_bits, data.to_vec()))
        }
        AppTag::Enumerated => PropertyValue::Enumerated(decode_unsigned(r, len as usize)?),
        AppTag::Date => PropertyValue::Date(Date::from_bytes(read_array(r, len)?)),
        AppTag::Time => PropertyValue::Time(Time::from_bytes(read_array(r, len)?)),
        AppTag::ObjectId => {
            PropertyValue::ObjectId(ObjectId::from_raw(u32::from_be_bytes(read_array(r, len)?)))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{
        decode_application_value, decode_property_payload, encode_application_value,
        encode_property_payload,
    };
    use crate::encoding::{reader::Reader, tag::Tag, writer::Writer};
    use crate::types::{BitString, Date, ObjectId, ObjectType, PropertyValue, Time};
    use crate::DecodeError;
    use alloc::vec;

    #[test]
    fn supported_types_round_trip() {
        let values = [
            PropertyValue::Null,
            PropertyValue::Boolean(true),
            PropertyValue::Boolean(false),
            PropertyValue::Unsigned(123),
            PropertyValue::Signed(-123),
            PropertyValue::Real(12.5),
            PropertyValue::Double(42.25),
            PropertyValue::OctetString(vec![1, 2, 3]),
            PropertyValue::from("hello"),
            PropertyValue::BitString(BitString::new(1, vec![0b1010_0000])),
            PropertyValue::Enumerated(9),
            PropertyValue::Date(Date {
                year_since_1900: 124,
                month: 2,
                day: 3,
                weekday: 6,
            }),
            PropertyValue::Time(Time {
                hour: 1,
                minute: 2,
                second: 3,
                hundredths: 4,
            }),
            PropertyValue::ObjectId(ObjectId::new(ObjectType::Device, 1)),
        ];

        for v in values {
            let mut buf = [0u8; 64];
            let mut w = Writer::new(&mut buf);
            encode_application_value(&mut w, &v).unwrap();
            let mut r = Reader::new(w.as_written());
            assert_eq!(decode_application_value(&mut r).unwrap(), v);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn real_is_four_big_endian_octets() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        encode_application_value(&mut w, &PropertyValue::Real(75.5)).unwrap();
        assert_eq!(w.as_written(), &[0x44, 0x42, 0x97, 0x00, 0x00]);
    }

    #[test]
    fn multi_value_payload_is_a_sequence() {
        let value = PropertyValue::Sequence(vec![
            PropertyValue::Null,
            PropertyValue::Real(20.0),
            PropertyValue::Null,
        ]);
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        encode_property_payload(&mut w, 3, &value).unwrap();

        let mut r = Reader::new(w.as_written());
        Tag::expect_opening(&mut r, 3).unwrap();
        assert_eq!(decode_property_payload(&mut r, 3).unwrap(), value);
    }

    #[test]
    fn foreign_charset_is_unsupported() {
        let mut r = Reader::new(&[0x73, 0x04, b'a', b'b']);
        assert_eq!(decode_application_value(&mut r), Err(DecodeError::Unsupported));
    }

    #[test]
    fn wrong_width_real_is_malformed() {
        let mut r = Reader::new(&[0x43, 0x00, 0x00, 0x00]);
        assert_eq!(decode_application_value(&mut r), Err(DecodeError::Malformed));
    }

    #[test]
    fn constructed_payload_is_unsupported() {
        let mut r = Reader::new(&[0x09, 0x01, 0x3F]);
        assert_eq!(decode_property_payload(&mut r, 3), Err(DecodeError::Unsupported));
    }
}
