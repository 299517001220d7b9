use crate::apdu::ApduType;
use crate::encoding::{
    primitives::{decode_unsigned, encode_app_enumerated},
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::{DecodeError, EncodeError};

const SEGMENTED: u8 = 0b0000_1000;
const MORE_FOLLOWS: u8 = 0b0000_0100;
const SEGMENTED_RESPONSE_ACCEPTED: u8 = 0b0000_0010;

/// Max-APDU code for 1476 octets, the largest a BACnet/IP link carries.
pub const MAX_APDU_1476: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedRequestHeader {
    pub segmented: bool,
    pub more_follows: bool,
    pub segmented_response_accepted: bool,
    pub max_segments: u8,
    pub max_apdu: u8,
    pub invoke_id: u8,
    pub sequence_number: Option<u8>,
    pub proposed_window_size: Option<u8>,
    pub service_choice: u8,
}

impl ConfirmedRequestHeader {
    /// Unsegmented request header with the largest APDU size BACnet/IP allows.
    pub const fn unsegmented(invoke_id: u8, service_choice: u8) -> Self {
        Self {
            segmented: false,
            more_follows: false,
            segmented_response_accepted: false,
            max_segments: 0,
            max_apdu: MAX_APDU_1476,
            invoke_id,
            sequence_number: None,
            proposed_window_size: None,
            service_choice,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let mut b0 = ApduType::ConfirmedRequest.header_bits();
        if self.segmented {
            b0 |= SEGMENTED;
        }
        if self.more_follows {
            b0 |= MORE_FOLLOWS;
        }
        if self.segmented_response_accepted {
            b0 |= SEGMENTED_RESPONSE_ACCEPTED;
        }

        w.write_u8(b0)?;
        w.write_u8((self.max_segments << 4) | (self.max_apdu & 0x0f))?;
        w.write_u8(self.invoke_id)?;
        if self.segmented {
            w.write_u8(self.sequence_number.unwrap_or(0))?;
            w.write_u8(self.proposed_window_size.unwrap_or(1))?;
        }
        w.write_u8(self.service_choice)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        ApduType::ConfirmedRequest.expect(b0)?;
        let segmented = b0 & SEGMENTED != 0;
        let seg_apdu = r.read_u8()?;
        let invoke_id = r.read_u8()?;
        let (sequence_number, proposed_window_size) = if segmented {
            (Some(r.read_u8()?), Some(r.read_u8()?))
        } else {
            (None, None)
        };
        Ok(Self {
            segmented,
            more_follows: b0 & MORE_FOLLOWS != 0,
            segmented_response_accepted: b0 & SEGMENTED_RESPONSE_ACCEPTED != 0,
            max_segments: (seg_apdu >> 4) & 0x07,
            max_apdu: seg_apdu & 0x0f,
            invoke_id,
            sequence_number,
            proposed_window_size,
            service_choice: r.read_u8()?,
        })
    }
}

/// Header of an unsegmented Complex-ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexAckHeader {
    pub invoke_id: u8,
    pub service_choice: u8,
}

impl ComplexAckHeader {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::ComplexAck.header_bits())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.service_choice)
    }

    /// Segmented acknowledgements decode as [`DecodeError::Unsupported`].
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        ApduType::ComplexAck.expect(b0)?;
        if b0 & SEGMENTED != 0 {
            return Err(DecodeError::Unsupported);
        }
        Ok(Self {
            invoke_id: r.read_u8()?,
            service_choice: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleAck {
    pub invoke_id: u8,
    pub service_choice: u8,
}

impl SimpleAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::SimpleAck.header_bits())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.service_choice)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        ApduType::SimpleAck.expect(r.read_u8()?)?;
        Ok(Self {
            invoke_id: r.read_u8()?,
            service_choice: r.read_u8()?,
        })
    }
}

/// Error-PDU: the device understood the request and refused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPdu {
    pub invoke_id: u8,
    pub service_choice: u8,
    pub error_class: u32,
    pub error_code: u32,
}

impl ErrorPdu {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::Error.header_bits())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.service_choice)?;
        encode_app_enumerated(w, self.error_class)?;
        encode_app_enumerated(w, self.error_code)
    }

    /// Accepts the standard pair of application enumerations and two common
    /// vendor variants: context tags 0/1, and the pair wrapped in opening and
    /// closing tag 0.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        ApduType::Error.expect(r.read_u8()?)?;
        let invoke_id = r.read_u8()?;
        let service_choice = r.read_u8()?;
        let (error_class, error_code) = match Tag::decode(r)? {
            Tag::Opening { tag_num: 0 } => {
                let class_tag = Tag::decode(r)?;
                let class = decode_error_value(r, class_tag, 0)?;
                let code_tag = Tag::decode(r)?;
                let code = decode_error_value(r, code_tag, 1)?;
                Tag::expect_closing(r, 0)?;
                (class, code)
            }
            class_tag => {
                let class = decode_error_value(r, class_tag, 0)?;
                let code_tag = Tag::decode(r)?;
                (class, decode_error_value(r, code_tag, 1)?)
            }
        };
        Ok(Self {
            invoke_id,
            service_choice,
            error_class,
            error_code,
        })
    }
}

fn decode_error_value(r: &mut Reader<'_>, tag: Tag, ctx_tag: u8) -> Result<u32, DecodeError> {
    match tag {
        Tag::Context { tag_num, len } if tag_num == ctx_tag => decode_unsigned(r, len as usize),
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::Malformed),
    }
}

/// Reject-PDU: the request was syntactically unacceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectPdu {
    pub invoke_id: u8,
    pub reason: u8,
}

impl RejectPdu {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::Reject.header_bits())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.reason)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        ApduType::Reject.expect(r.read_u8()?)?;
        Ok(Self {
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}

/// Abort-PDU: the transaction was terminated by either peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPdu {
    pub server: bool,
    pub invoke_id: u8,
    pub reason: u8,
}

impl AbortPdu {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::Abort.header_bits() | u8::from(self.server))?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.reason)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        ApduType::Abort.expect(b0)?;
        Ok(Self {
            server: b0 & 0x01 != 0,
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AbortPdu, ComplexAckHeader, ConfirmedRequestHeader, ErrorPdu};
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::DecodeError;

    #[test]
    fn confirmed_header_layout() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        ConfirmedRequestHeader::unsegmented(7, 0x0C)
            .encode(&mut w)
            .unwrap();
        assert_eq!(w.as_written(), &[0x00, 0x05, 7, 0x0C]);
    }

    #[test]
    fn error_pdu_without_details_is_truncated() {
        let mut r = Reader::new(&[0x50, 1, 15]);
        assert_eq!(ErrorPdu::decode(&mut r), Err(DecodeError::Truncated));
    }

    #[test]
    fn error_pdu_decodes_application_enumerated_details() {
        let mut r = Reader::new(&[0x50, 1, 15, 0x91, 0x02, 0x91, 0x20]);
        let e = ErrorPdu::decode(&mut r).unwrap();
        assert_eq!(e.invoke_id, 1);
        assert_eq!(e.service_choice, 15);
        assert_eq!((e.error_class, e.error_code), (2, 32));
    }

    #[test]
    fn error_pdu_decodes_vendor_context_details() {
        let mut r = Reader::new(&[0x50, 1, 15, 0x09, 0x02, 0x19, 0x20]);
        let e = ErrorPdu::decode(&mut r).unwrap();
        assert_eq!((e.error_class, e.error_code), (2, 32));

        let mut r = Reader::new(&[0x50, 1, 15, 0x0E, 0x91, 0x02, 0x91, 0x20, 0x0F]);
        let e = ErrorPdu::decode(&mut r).unwrap();
        assert_eq!((e.error_class, e.error_code), (2, 32));
    }

    #[test]
    fn error_pdu_encodes_application_enumerations() {
        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        ErrorPdu {
            invoke_id: 4,
            service_choice: 0x0C,
            error_class: 1,
            error_code: 31,
        }
        .encode(&mut w)
        .unwrap();
        assert_eq!(w.as_written(), &[0x50, 4, 0x0C, 0x91, 0x01, 0x91, 0x1F]);
    }

    #[test]
    fn segmented_complex_ack_is_unsupported() {
        let mut r = Reader::new(&[0x3C, 1, 0, 4, 0x0C]);
        assert_eq!(ComplexAckHeader::decode(&mut r), Err(DecodeError::Unsupported));
    }

    #[test]
    fn abort_carries_server_flag() {
        let mut r = Reader::new(&[0x71, 9, 4]);
        let abort = AbortPdu::decode(&mut r).unwrap();
        assert!(abort.server);
        assert_eq!((abort.invoke_id, abort.reason), (9, 4));
    }
}
