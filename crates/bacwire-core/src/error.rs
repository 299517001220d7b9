use core::fmt;

/// Failure while serialising a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The output buffer cannot hold the frame.
    BufferTooSmall,
    /// A field is outside the range its wire encoding allows.
    ValueOutOfRange,
    /// The value has no representation in this codec.
    Unsupported,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("buffer too small"),
            Self::ValueOutOfRange => f.write_str("value out of range"),
            Self::Unsupported => f.write_str("value not encodable"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// Failure while parsing a received frame.
///
/// Decoding never panics: every inbound byte sequence maps to either a
/// parsed frame or one of these three outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before a declared length is satisfied.
    Truncated,
    /// A tag, length, or field value violates the encoding rules.
    Malformed,
    /// The frame is well formed but uses a PDU type, service, or data type
    /// this codec does not handle.
    Unsupported,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("frame truncated"),
            Self::Malformed => f.write_str("malformed frame"),
            Self::Unsupported => f.write_str("unsupported frame"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
