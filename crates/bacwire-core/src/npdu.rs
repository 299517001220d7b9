use core::fmt;

use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

/// BACnet network layer protocol version (always `0x01`).
pub const NPDU_VERSION: u8 = 0x01;

const NETWORK_MESSAGE: u8 = 0x80;
const HAS_DESTINATION: u8 = 0x20;
const HAS_SOURCE: u8 = 0x08;
const EXPECTING_REPLY: u8 = 0x04;

/// A remote network-layer address: network number plus a MAC of up to six
/// octets. A zero-length MAC addresses every node on that network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NpduAddress {
    network: u16,
    mac: [u8; 6],
    mac_len: u8,
}

impl NpduAddress {
    pub fn new(network: u16, mac: &[u8]) -> Result<Self, EncodeError> {
        if mac.len() > 6 {
            return Err(EncodeError::ValueOutOfRange);
        }
        let mut buf = [0u8; 6];
        buf[..mac.len()].copy_from_slice(mac);
        Ok(Self {
            network,
            mac: buf,
            mac_len: mac.len() as u8,
        })
    }

    pub const fn network(&self) -> u16 {
        self.network
    }

    pub fn mac(&self) -> &[u8] {
        &self.mac[..self.mac_len as usize]
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_be_u16(self.network)?;
        w.write_u8(self.mac_len)?;
        w.write_all(self.mac())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let network = r.read_be_u16()?;
        let mac_len = r.read_u8()? as usize;
        if mac_len > 6 {
            return Err(DecodeError::Malformed);
        }
        let mac = r.read_exact(mac_len)?;
        Self::new(network, mac).map_err(|_| DecodeError::Malformed)
    }
}

impl fmt::Display for NpduAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.network)?;
        for b in self.mac() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// BACnet Network Protocol Data Unit (NPDU) header.
///
/// The control octet is derived from the fields on encode and expanded back
/// into them on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Npdu {
    pub expecting_reply: bool,
    /// Network priority, 0 (normal) to 3 (life safety).
    pub priority: u8,
    pub destination: Option<NpduAddress>,
    pub source: Option<NpduAddress>,
    pub hop_count: Option<u8>,
    /// Network-layer message type; such NPDUs carry no APDU.
    pub message_type: Option<u8>,
}

impl Npdu {
    /// Header for an application message, routed when `destination` is set.
    pub const fn application(expecting_reply: bool, destination: Option<NpduAddress>) -> Self {
        Self {
            expecting_reply,
            priority: 0,
            destination,
            source: None,
            hop_count: None,
            message_type: None,
        }
    }

    pub fn control(&self) -> u8 {
        let mut control = self.priority & 0x03;
        if self.message_type.is_some() {
            control |= NETWORK_MESSAGE;
        }
        if self.destination.is_some() {
            control |= HAS_DESTINATION;
        }
        if self.source.is_some() {
            control |= HAS_SOURCE;
        }
        if self.expecting_reply {
            control |= EXPECTING_REPLY;
        }
        control
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(NPDU_VERSION)?;
        w.write_u8(self.control())?;
        if let Some(dest) = &self.destination {
            dest.encode(w)?;
        }
        if let Some(src) = &self.source {
            src.encode(w)?;
        }
        if self.destination.is_some() {
            w.write_u8(self.hop_count.unwrap_or(255))?;
        }
        if let Some(message_type) = self.message_type {
            w.write_u8(message_type)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if r.read_u8()? != NPDU_VERSION {
            return Err(DecodeError::Malformed);
        }
        let control = r.read_u8()?;
        let destination = if control & HAS_DESTINATION != 0 {
            Some(NpduAddress::decode(r)?)
        } else {
            None
        };
        let source = if control & HAS_SOURCE != 0 {
            Some(NpduAddress::decode(r)?)
        } else {
            None
        };
        let hop_count = match destination {
            Some(_) => Some(r.read_u8()?),
            None => None,
        };
        let message_type = if control & NETWORK_MESSAGE != 0 {
            let message_type = r.read_u8()?;
            if message_type >= 0x80 {
                r.read_be_u16()?;
            }
            Some(message_type)
        } else {
            None
        };
        Ok(Self {
            expecting_reply: control & EXPECTING_REPLY != 0,
            priority: control & 0x03,
            destination,
            source,
            hop_count,
            message_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Npdu, NpduAddress};
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::DecodeError;

    #[test]
    fn local_request_is_two_octets() {
        let mut buf = [0u8; 4];
        let mut w = Writer::new(&mut buf);
        Npdu::application(true, None).encode(&mut w).unwrap();
        assert_eq!(w.as_written(), &[0x01, 0x04]);
    }

    #[test]
    fn routed_destination_round_trips_with_hop_count() {
        let dest = NpduAddress::new(5, &[0x0A]).unwrap();
        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        Npdu::application(true, Some(dest)).encode(&mut w).unwrap();
        assert_eq!(w.as_written(), &[0x01, 0x24, 0x00, 0x05, 0x01, 0x0A, 0xFF]);

        let mut r = Reader::new(w.as_written());
        let decoded = Npdu::decode(&mut r).unwrap();
        assert_eq!(decoded.destination, Some(dest));
        assert_eq!(decoded.hop_count, Some(255));
        assert!(decoded.expecting_reply);
        assert!(r.is_empty());
    }

    #[test]
    fn source_specifier_is_decoded() {
        let bytes = [0x01, 0x08, 0x00, 0x07, 0x02, 0x12, 0x34];
        let decoded = Npdu::decode(&mut Reader::new(&bytes)).unwrap();
        let source = decoded.source.unwrap();
        assert_eq!(source.network(), 7);
        assert_eq!(source.mac(), &[0x12, 0x34]);
        assert_eq!(source.to_string(), "7:1234");
    }

    #[test]
    fn rejects_bad_version_and_long_mac() {
        assert_eq!(
            Npdu::decode(&mut Reader::new(&[0x02, 0x00])),
            Err(DecodeError::Malformed)
        );
        assert_eq!(
            Npdu::decode(&mut Reader::new(&[0x01, 0x08, 0x00, 0x01, 0x07])),
            Err(DecodeError::Malformed)
        );
        assert!(NpduAddress::new(1, &[0; 7]).is_err());
    }
}
