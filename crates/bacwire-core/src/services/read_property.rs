use crate::apdu::{ComplexAckHeader, ConfirmedRequestHeader};
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

pub const SERVICE_READ_PROPERTY: u8 = 0x0C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPropertyRequest {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub invoke_id: u8,
}

impl ReadPropertyRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        ConfirmedRequestHeader::unsegmented(self.invoke_id, SERVICE_READ_PROPERTY).encode(w)?;
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_unsigned(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        Ok(())
    }

    /// Decodes the service parameters that follow a confirmed-request header.
    pub fn decode_after_header(r: &mut Reader<'_>, invoke_id: u8) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(r, 1)?);
        let array_index = decode_optional_ctx_unsigned(r, 2)?;
        r.finish()?;
        Ok(Self {
            object_id,
            property_id,
            array_index,
            invoke_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    pub invoke_id: u8,
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: PropertyValue,
}

impl ReadPropertyAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        ComplexAckHeader {
            invoke_id: self.invoke_id,
            service_choice: SERVICE_READ_PROPERTY,
        }
        .encode(w)?;
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_unsigned(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        encode_property_payload(w, 3, &self.value)
    }

    pub fn decode_after_header(r: &mut Reader<'_>, invoke_id: u8) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(r, 1)?);
        let array_index = decode_optional_ctx_unsigned(r, 2)?;
        Tag::expect_opening(r, 3)?;
        let value = decode_property_payload(r, 3)?;
        r.finish()?;
        Ok(Self {
            invoke_id,
            object_id,
            property_id,
            array_index,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadPropertyAck, ReadPropertyRequest};
    use crate::apdu::ComplexAckHeader;
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::types::{ObjectId, ObjectType, PropertyId, PropertyValue};
    use crate::DecodeError;

    #[test]
    fn request_body_with_array_index() {
        let req = ReadPropertyRequest {
            object_id: ObjectId::new(ObjectType::AnalogValue, 1),
            property_id: PropertyId::PriorityArray,
            array_index: Some(8),
            invoke_id: 3,
        };
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        req.encode(&mut w).unwrap();
        assert_eq!(
            w.as_written(),
            &[0x00, 0x05, 3, 0x0C, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x57, 0x29, 0x08]
        );
        let mut r = Reader::new(&w.as_written()[4..]);
        assert_eq!(ReadPropertyRequest::decode_after_header(&mut r, 3).unwrap(), req);
    }

    #[test]
    fn ack_decodes_real_present_value() {
        let bytes = [
            0x30, 0x09, 0x0C, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E, 0x44, 0x42, 0x97,
            0x00, 0x00, 0x3F,
        ];
        let mut r = Reader::new(&bytes);
        let hdr = ComplexAckHeader::decode(&mut r).unwrap();
        let ack = ReadPropertyAck::decode_after_header(&mut r, hdr.invoke_id).unwrap();
        assert_eq!(ack.invoke_id, 9);
        assert_eq!(ack.property_id, PropertyId::PresentValue);
        assert_eq!(ack.value, PropertyValue::Real(75.5));
    }

    #[test]
    fn ack_missing_closing_tag_is_truncated() {
        let bytes = [0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E, 0x91, 0x01];
        let mut r = Reader::new(&bytes);
        assert_eq!(
            ReadPropertyAck::decode_after_header(&mut r, 0),
            Err(DecodeError::Truncated)
        );
    }
}
