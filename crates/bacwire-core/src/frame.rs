//! Whole-frame codec: an NPDU header followed by one APDU.
//!
//! BVLL framing belongs to the transport; everything handed to [`encode`]
//! and returned from [`decode`] starts at the NPDU version octet.

use alloc::vec::Vec;

use crate::apdu::{
    AbortPdu, ApduType, ComplexAckHeader, ConfirmedRequestHeader, ErrorPdu, RejectPdu, SimpleAck,
    UnconfirmedRequestHeader,
};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::npdu::{Npdu, NpduAddress};
use crate::services::{
    IAmRequest, ReadPropertyAck, ReadPropertyRequest, WhoIsRequest, WritePropertyRequest,
    SERVICE_I_AM, SERVICE_READ_PROPERTY, SERVICE_WHO_IS, SERVICE_WRITE_PROPERTY,
};
use crate::{DecodeError, EncodeError};

/// Largest NPDU a BACnet/IP datagram carries (1497 octets less BVLL).
pub const MAX_NPDU_LEN: usize = 1497;

/// One APDU this codec understands, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    WhoIs(WhoIsRequest),
    IAm(IAmRequest),
    ReadProperty(ReadPropertyRequest),
    WriteProperty(WritePropertyRequest),
    ReadPropertyAck(ReadPropertyAck),
    SimpleAck(SimpleAck),
    Error(ErrorPdu),
    Reject(RejectPdu),
    Abort(AbortPdu),
}

impl Pdu {
    /// Invoke ID for confirmed requests and every response type.
    pub fn invoke_id(&self) -> Option<u8> {
        match self {
            Self::WhoIs(_) | Self::IAm(_) => None,
            Self::ReadProperty(req) => Some(req.invoke_id),
            Self::WriteProperty(req) => Some(req.invoke_id),
            Self::ReadPropertyAck(ack) => Some(ack.invoke_id),
            Self::SimpleAck(ack) => Some(ack.invoke_id),
            Self::Error(err) => Some(err.invoke_id),
            Self::Reject(rej) => Some(rej.invoke_id),
            Self::Abort(abort) => Some(abort.invoke_id),
        }
    }

    /// True for PDUs that answer a confirmed request.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::ReadPropertyAck(_)
                | Self::SimpleAck(_)
                | Self::Error(_)
                | Self::Reject(_)
                | Self::Abort(_)
        )
    }

    /// Service choice where the PDU names one. Reject and Abort do not.
    pub fn service_choice(&self) -> Option<u8> {
        match self {
            Self::WhoIs(_) => Some(SERVICE_WHO_IS),
            Self::IAm(_) => Some(SERVICE_I_AM),
            Self::ReadProperty(_) | Self::ReadPropertyAck(_) => Some(SERVICE_READ_PROPERTY),
            Self::WriteProperty(_) => Some(SERVICE_WRITE_PROPERTY),
            Self::SimpleAck(ack) => Some(ack.service_choice),
            Self::Error(err) => Some(err.service_choice),
            Self::Reject(_) | Self::Abort(_) => None,
        }
    }

    fn expects_reply(&self) -> bool {
        matches!(self, Self::ReadProperty(_) | Self::WriteProperty(_))
    }

    fn encode_apdu(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::WhoIs(req) => req.encode(w),
            Self::IAm(req) => req.encode(w),
            Self::ReadProperty(req) => req.encode(w),
            Self::WriteProperty(req) => req.encode(w),
            Self::ReadPropertyAck(ack) => ack.encode(w),
            Self::SimpleAck(ack) => ack.encode(w),
            Self::Error(err) => err.encode(w),
            Self::Reject(rej) => rej.encode(w),
            Self::Abort(abort) => abort.encode(w),
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    /// SNET/SADR when the frame came through a router.
    pub source: Option<NpduAddress>,
    pub pdu: Pdu,
}

/// Encodes `pdu` for a device on the local network.
pub fn encode(pdu: &Pdu) -> Result<Vec<u8>, EncodeError> {
    encode_routed(pdu, None)
}

/// Encodes `pdu`, adding an NPDU destination specifier when `destination`
/// names a device behind a router.
pub fn encode_routed(pdu: &Pdu, destination: Option<NpduAddress>) -> Result<Vec<u8>, EncodeError> {
    let mut buf = [0u8; MAX_NPDU_LEN];
    let mut w = Writer::new(&mut buf);
    Npdu::application(pdu.expects_reply(), destination).encode(&mut w)?;
    pdu.encode_apdu(&mut w)?;
    Ok(w.as_written().to_vec())
}

/// Decodes one NPDU + APDU.
///
/// Network-layer messages, segment acknowledgements, segmented messages and
/// services other than Who-Is, I-Am, ReadProperty and WriteProperty are
/// reported as [`DecodeError::Unsupported`].
pub fn decode(bytes: &[u8]) -> Result<ParsedFrame, DecodeError> {
    let mut r = Reader::new(bytes);
    let npdu = Npdu::decode(&mut r)?;
    if npdu.message_type.is_some() {
        return Err(DecodeError::Unsupported);
    }
    let pdu = match ApduType::of(r.peek_u8()?)? {
        ApduType::ConfirmedRequest => {
            let hdr = ConfirmedRequestHeader::decode(&mut r)?;
            if hdr.segmented {
                return Err(DecodeError::Unsupported);
            }
            match hdr.service_choice {
                SERVICE_READ_PROPERTY => {
                    Pdu::ReadProperty(ReadPropertyRequest::decode_after_header(&mut r, hdr.invoke_id)?)
                }
                SERVICE_WRITE_PROPERTY => Pdu::WriteProperty(
                    WritePropertyRequest::decode_after_header(&mut r, hdr.invoke_id)?,
                ),
                _ => return Err(DecodeError::Unsupported),
            }
        }
        ApduType::UnconfirmedRequest => {
            let hdr = UnconfirmedRequestHeader::decode(&mut r)?;
            match hdr.service_choice {
                SERVICE_WHO_IS => Pdu::WhoIs(WhoIsRequest::decode_after_header(&mut r)?),
                SERVICE_I_AM => Pdu::IAm(IAmRequest::decode_after_header(&mut r)?),
                _ => return Err(DecodeError::Unsupported),
            }
        }
        ApduType::ComplexAck => {
            let hdr = ComplexAckHeader::decode(&mut r)?;
            match hdr.service_choice {
                SERVICE_READ_PROPERTY => {
                    Pdu::ReadPropertyAck(ReadPropertyAck::decode_after_header(&mut r, hdr.invoke_id)?)
                }
                _ => return Err(DecodeError::Unsupported),
            }
        }
        ApduType::SimpleAck => Pdu::SimpleAck(SimpleAck::decode(&mut r)?),
        ApduType::Error => Pdu::Error(ErrorPdu::decode(&mut r)?),
        ApduType::Reject => Pdu::Reject(RejectPdu::decode(&mut r)?),
        ApduType::Abort => Pdu::Abort(AbortPdu::decode(&mut r)?),
        ApduType::SegmentAck => return Err(DecodeError::Unsupported),
    };
    r.finish()?;
    Ok(ParsedFrame {
        source: npdu.source,
        pdu,
    })
}
