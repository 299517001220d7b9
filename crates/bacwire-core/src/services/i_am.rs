use crate::apdu::UnconfirmedRequestHeader;
use crate::encoding::{
    primitives::{
        decode_app_enumerated, decode_app_object_id, decode_app_unsigned, encode_app_enumerated,
        encode_app_object_id, encode_app_unsigned,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::{DeviceInstance, ObjectId, Segmentation};
use crate::{DecodeError, EncodeError};

pub const SERVICE_I_AM: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IAmRequest {
    pub device_id: ObjectId,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u16,
}

impl IAmRequest {
    /// The announcing device's instance, if the identifier names a Device.
    pub fn device_instance(&self) -> Option<DeviceInstance> {
        DeviceInstance::from_object_id(self.device_id)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        UnconfirmedRequestHeader {
            service_choice: SERVICE_I_AM,
        }
        .encode(w)?;
        encode_app_object_id(w, self.device_id.raw())?;
        encode_app_unsigned(w, self.max_apdu)?;
        encode_app_enumerated(w, self.segmentation.to_u32())?;
        encode_app_unsigned(w, self.vendor_id as u32)
    }

    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let device_id = ObjectId::from_raw(decode_app_object_id(r)?);
        let max_apdu = decode_app_unsigned(r)?;
        let segmentation =
            Segmentation::from_u32(decode_app_enumerated(r)?).ok_or(DecodeError::Malformed)?;
        let vendor_id =
            u16::try_from(decode_app_unsigned(r)?).map_err(|_| DecodeError::Malformed)?;
        Ok(Self {
            device_id,
            max_apdu,
            segmentation,
            vendor_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::IAmRequest;
    use crate::apdu::UnconfirmedRequestHeader;
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::types::{ObjectId, ObjectType, Segmentation};
    use crate::DecodeError;

    #[test]
    fn i_am_wire_layout() {
        let req = IAmRequest {
            device_id: ObjectId::new(ObjectType::Device, 1234),
            max_apdu: 1476,
            segmentation: Segmentation::NoSegmentation,
            vendor_id: 260,
        };
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        req.encode(&mut w).unwrap();
        assert_eq!(
            w.as_written(),
            &[
                0x10, 0x00, 0xC4, 0x02, 0x00, 0x04, 0xD2, 0x22, 0x05, 0xC4, 0x91, 0x03, 0x22,
                0x01, 0x04
            ]
        );

        let mut r = Reader::new(w.as_written());
        UnconfirmedRequestHeader::decode(&mut r).unwrap();
        let decoded = IAmRequest::decode_after_header(&mut r).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.device_instance().unwrap().get(), 1234);
    }

    #[test]
    fn unknown_segmentation_is_malformed() {
        let bytes = [0xC4, 0x02, 0x00, 0x00, 0x01, 0x21, 0x32, 0x91, 0x09, 0x21, 0x01];
        let mut r = Reader::new(&bytes);
        assert_eq!(IAmRequest::decode_after_header(&mut r), Err(DecodeError::Malformed));
    }
}
