use crate::DataLinkError;
use bacwire_core::encoding::{reader::Reader, writer::Writer};
use bacwire_core::{DecodeError, EncodeError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const BVLC_TYPE_BIP: u8 = 0x81;
pub const BVLC_HEADER_LEN: usize = 4;

/// Largest datagram accepted or produced.
pub const MAX_BIP_FRAME_LEN: usize = 1600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvlcFunction {
    Result,
    WriteBroadcastDistributionTable,
    ReadBroadcastDistributionTable,
    ReadBroadcastDistributionTableAck,
    ForwardedNpdu,
    RegisterForeignDevice,
    ReadForeignDeviceTable,
    ReadForeignDeviceTableAck,
    DeleteForeignDeviceTableEntry,
    DistributeBroadcastToNetwork,
    OriginalUnicastNpdu,
    OriginalBroadcastNpdu,
    Unknown(u8),
}

impl BvlcFunction {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Result,
            0x01 => Self::WriteBroadcastDistributionTable,
            0x02 => Self::ReadBroadcastDistributionTable,
            0x03 => Self::ReadBroadcastDistributionTableAck,
            0x04 => Self::ForwardedNpdu,
            0x05 => Self::RegisterForeignDevice,
            0x06 => Self::ReadForeignDeviceTable,
            0x07 => Self::ReadForeignDeviceTableAck,
            0x08 => Self::DeleteForeignDeviceTableEntry,
            0x09 => Self::DistributeBroadcastToNetwork,
            0x0A => Self::OriginalUnicastNpdu,
            0x0B => Self::OriginalBroadcastNpdu,
            v => Self::Unknown(v),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Result => 0x00,
            Self::WriteBroadcastDistributionTable => 0x01,
            Self::ReadBroadcastDistributionTable => 0x02,
            Self::ReadBroadcastDistributionTableAck => 0x03,
            Self::ForwardedNpdu => 0x04,
            Self::RegisterForeignDevice => 0x05,
            Self::ReadForeignDeviceTable => 0x06,
            Self::ReadForeignDeviceTableAck => 0x07,
            Self::DeleteForeignDeviceTableEntry => 0x08,
            Self::DistributeBroadcastToNetwork => 0x09,
            Self::OriginalUnicastNpdu => 0x0A,
            Self::OriginalBroadcastNpdu => 0x0B,
            Self::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvlcHeader {
    pub function: BvlcFunction,
    pub length: u16,
}

impl BvlcHeader {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(BVLC_TYPE_BIP)?;
        w.write_u8(self.function.to_u8())?;
        w.write_be_u16(self.length)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if r.read_u8()? != BVLC_TYPE_BIP {
            return Err(DecodeError::Malformed);
        }
        let function = BvlcFunction::from_u8(r.read_u8()?);
        let length = r.read_be_u16()?;
        if (length as usize) < BVLC_HEADER_LEN {
            return Err(DecodeError::Malformed);
        }
        Ok(Self { function, length })
    }
}

/// Prefixes `payload` with a BVLL header for `function`.
pub fn wrap(function: BvlcFunction, payload: &[u8]) -> Result<Vec<u8>, DataLinkError> {
    let total_len = BVLC_HEADER_LEN
        .checked_add(payload.len())
        .ok_or(DataLinkError::FrameTooLarge)?;
    if total_len > MAX_BIP_FRAME_LEN {
        return Err(DataLinkError::FrameTooLarge);
    }
    let mut frame = vec![0u8; total_len];
    let mut w = Writer::new(&mut frame);
    BvlcHeader {
        function,
        length: total_len as u16,
    }
    .encode(&mut w)
    .map_err(|_| DataLinkError::InvalidFrame)?;
    w.write_all(payload)
        .map_err(|_| DataLinkError::FrameTooLarge)?;
    Ok(frame)
}

/// One received BVLL message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bvll<'a> {
    /// An NPDU. `origin` is set for Forwarded-NPDU and names the device that
    /// originally sent it, rather than the BBMD that forwarded it.
    Npdu {
        payload: &'a [u8],
        origin: Option<SocketAddr>,
    },
    /// BVLC-Result carrying its result code.
    Result(u16),
    /// A well-formed BVLL message with no NPDU for this node.
    Control(BvlcFunction),
}

impl<'a> Bvll<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self, DataLinkError> {
        if frame.len() > MAX_BIP_FRAME_LEN {
            return Err(DataLinkError::FrameTooLarge);
        }
        let mut r = Reader::new(frame);
        let hdr = BvlcHeader::decode(&mut r).map_err(|_| DataLinkError::InvalidFrame)?;
        let mut body = r
            .take(hdr.length as usize - BVLC_HEADER_LEN)
            .map_err(|_| DataLinkError::InvalidFrame)?;

        match hdr.function {
            BvlcFunction::OriginalUnicastNpdu
            | BvlcFunction::OriginalBroadcastNpdu
            | BvlcFunction::DistributeBroadcastToNetwork => Ok(Self::Npdu {
                payload: body.rest(),
                origin: None,
            }),
            BvlcFunction::ForwardedNpdu => {
                let ip = body.read_exact(4).map_err(|_| DataLinkError::InvalidFrame)?;
                let port = body.read_be_u16().map_err(|_| DataLinkError::InvalidFrame)?;
                let origin = SocketAddr::new(
                    IpAddr::V4(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])),
                    port,
                );
                Ok(Self::Npdu {
                    payload: body.rest(),
                    origin: Some(origin),
                })
            }
            BvlcFunction::Result => {
                let code = body.read_be_u16().map_err(|_| DataLinkError::InvalidFrame)?;
                Ok(Self::Result(code))
            }
            BvlcFunction::Unknown(v) => Err(DataLinkError::UnsupportedBvlcFunction(v)),
            other => Ok(Self::Control(other)),
        }
    }
}
