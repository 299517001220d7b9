use crate::DecodeError;

/// The PDU type carried in the high nibble of an APDU's first octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduType {
    ConfirmedRequest = 0,
    UnconfirmedRequest = 1,
    SimpleAck = 2,
    ComplexAck = 3,
    SegmentAck = 4,
    Error = 5,
    Reject = 6,
    Abort = 7,
}

impl ApduType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ConfirmedRequest),
            1 => Some(Self::UnconfirmedRequest),
            2 => Some(Self::SimpleAck),
            3 => Some(Self::ComplexAck),
            4 => Some(Self::SegmentAck),
            5 => Some(Self::Error),
            6 => Some(Self::Reject),
            7 => Some(Self::Abort),
            _ => None,
        }
    }

    /// Classifies an APDU by its first octet. Types 8 to 15 are reserved and
    /// reported as unsupported rather than malformed.
    pub fn of(first_octet: u8) -> Result<Self, DecodeError> {
        Self::from_u8(first_octet >> 4).ok_or(DecodeError::Unsupported)
    }

    pub(crate) const fn header_bits(self) -> u8 {
        (self as u8) << 4
    }

    pub(crate) fn expect(self, first_octet: u8) -> Result<(), DecodeError> {
        if first_octet >> 4 == self as u8 {
            Ok(())
        } else {
            Err(DecodeError::Malformed)
        }
    }
}
