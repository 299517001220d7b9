use bacwire_core::types::{DeviceInstance, ErrorClass, ErrorCode, PropertyValue};
use bacwire_datalink::{Address, DataLinkError};
use core::fmt;
use thiserror::Error;

/// How a device turned a confirmed request down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rejection {
    /// Error-PDU with raw class and code, kept raw so vendor values survive.
    Error { class: u32, code: u32 },
    Reject { reason: u8 },
    Abort { reason: u8, server: bool },
}

impl Rejection {
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Error { class, .. } => ErrorClass::from_u32(*class),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => ErrorCode::from_u32(*code),
            _ => None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { class, code } => match (self.error_class(), self.error_code()) {
                (Some(c), Some(e)) => write!(f, "error {c:?}/{e:?}"),
                _ => write!(f, "error class {class} code {code}"),
            },
            Self::Reject { reason } => write!(f, "reject reason {reason}"),
            Self::Abort { reason, server } => write!(f, "abort reason {reason} (server={server})"),
        }
    }
}

/// Terminal failure of one confirmed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("request timed out")]
    Timeout,
    #[error("device rejected the request: {0}")]
    DeviceRejected(Rejection),
    #[error("request cancelled")]
    Cancelled,
    #[error("client is not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("encode error: {0}")]
    Encode(#[from] bacwire_core::EncodeError),
    #[error(transparent)]
    Request(#[from] ErrorKind),
    #[error("all invoke IDs to {destination} are in flight")]
    ResourceExhausted { destination: Address },
    #[error("device {0} is not known")]
    UnknownDevice(DeviceInstance),
    #[error("unsupported response")]
    UnsupportedResponse,
    #[error("unexpected value {0}")]
    UnexpectedValue(PropertyValue),
}

impl ClientError {
    /// The request-lifecycle failure, if this is one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Request(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == Some(ErrorKind::Timeout)
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self.kind() {
            Some(ErrorKind::DeviceRejected(rejection)) => Some(rejection),
            _ => None,
        }
    }
}
