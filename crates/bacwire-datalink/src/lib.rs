//! BACnet/IP data link for bacwire: BVLL framing over UDP, foreign-device
//! registration and a background receive loop.
//!
//! Everything here is byte-oriented. NPDUs are produced and parsed by
//! `bacwire-core`.

pub mod address;
pub mod bip;
pub mod receive;
pub mod traits;

pub use address::Address;
pub use bip::transport::{BacnetIpTransport, ForeignDevice, TransportConfig};
pub use receive::{Datagram, Elapsed, Incoming, ReceiveLoop, DEFAULT_QUEUE_DEPTH};
pub use traits::{DataLink, DataLinkError};
