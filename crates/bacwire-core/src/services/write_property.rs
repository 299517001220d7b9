use crate::apdu::ConfirmedRequestHeader;
use crate::encoding::{
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_optional_ctx_unsigned,
        encode_ctx_object_id, encode_ctx_unsigned,
    },
    reader::Reader,
    tag::Tag,
    writer::Writer,
};
use crate::services::value_codec::{decode_property_payload, encode_property_payload};
use crate::types::{ObjectId, PropertyId, PropertyValue};
use crate::{DecodeError, EncodeError};

pub const SERVICE_WRITE_PROPERTY: u8 = 0x0F;

/// Command priorities run from 1 (manual life safety) to 16 (lowest).
pub const PRIORITY_RANGE: core::ops::RangeInclusive<u8> = 1..=16;

#[derive(Debug, Clone, PartialEq)]
pub struct WritePropertyRequest {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: PropertyValue,
    /// `None` writes without a priority.
    pub priority: Option<u8>,
    pub invoke_id: u8,
}

impl WritePropertyRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if let Some(priority) = self.priority {
            if !PRIORITY_RANGE.contains(&priority) {
                return Err(EncodeError::ValueOutOfRange);
            }
        }
        ConfirmedRequestHeader::unsegmented(self.invoke_id, SERVICE_WRITE_PROPERTY).encode(w)?;
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_unsigned(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        encode_property_payload(w, 3, &self.value)?;
        if let Some(priority) = self.priority {
            encode_ctx_unsigned(w, 4, priority as u32)?;
        }
        Ok(())
    }

    pub fn decode_after_header(r: &mut Reader<'_>, invoke_id: u8) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(r, 1)?);
        let array_index = decode_optional_ctx_unsigned(r, 2)?;
        Tag::expect_opening(r, 3)?;
        let value = decode_property_payload(r, 3)?;
        let priority = match decode_optional_ctx_unsigned(r, 4)? {
            Some(p) => Some(
                u8::try_from(p)
                    .ok()
                    .filter(|p| PRIORITY_RANGE.contains(p))
                    .ok_or(DecodeError::Malformed)?,
            ),
            None => None,
        };
        r.finish()?;
        Ok(Self {
            object_id,
            property_id,
            array_index,
            value,
            priority,
            invoke_id,
        })
    }
}
