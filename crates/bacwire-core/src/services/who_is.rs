use crate::apdu::UnconfirmedRequestHeader;
use crate::encoding::primitives::{decode_ctx_unsigned, encode_ctx_unsigned};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::types::MAX_INSTANCE;
use crate::{DecodeError, EncodeError};

pub const SERVICE_WHO_IS: u8 = 0x08;

/// Who-Is, optionally limited to an inclusive device-instance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhoIsRequest {
    pub low_limit: Option<u32>,
    pub high_limit: Option<u32>,
}

impl WhoIsRequest {
    pub const fn global() -> Self {
        Self {
            low_limit: None,
            high_limit: None,
        }
    }

    pub fn range(low: u32, high: u32) -> Result<Self, EncodeError> {
        if low > high || high > MAX_INSTANCE {
            return Err(EncodeError::ValueOutOfRange);
        }
        Ok(Self {
            low_limit: Some(low),
            high_limit: Some(high),
        })
    }

    /// Whether a device with this instance should answer.
    pub fn matches(&self, instance: u32) -> bool {
        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => (low..=high).contains(&instance),
            _ => true,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        UnconfirmedRequestHeader {
            service_choice: SERVICE_WHO_IS,
        }
        .encode(w)?;

        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => {
                encode_ctx_unsigned(w, 0, low)?;
                encode_ctx_unsigned(w, 1, high)
            }
            (None, None) => Ok(()),
            _ => Err(EncodeError::ValueOutOfRange),
        }
    }

    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if r.is_empty() {
            return Ok(Self::global());
        }
        let low = decode_ctx_unsigned(r, 0)?;
        let high = decode_ctx_unsigned(r, 1)?;
        if low > MAX_INSTANCE || high > MAX_INSTANCE {
            return Err(DecodeError::Malformed);
        }
        Ok(Self {
            low_limit: Some(low),
            high_limit: Some(high),
        })
    }
}
