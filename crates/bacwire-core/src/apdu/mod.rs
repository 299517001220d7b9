/// Confirmed-service request headers and the acknowledgement/error PDUs.
pub mod confirmed;
/// APDU type discriminant.
pub mod pdu;
/// Unconfirmed-service request header.
pub mod unconfirmed;

pub use confirmed::{
    AbortPdu, ComplexAckHeader, ConfirmedRequestHeader, ErrorPdu, RejectPdu, SimpleAck,
};
pub use pdu::ApduType;
pub use unconfirmed::UnconfirmedRequestHeader;
