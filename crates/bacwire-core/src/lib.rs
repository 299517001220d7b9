//! BACnet/IP frame codec in pure Rust.
//!
//! `bacwire-core` encodes and decodes the NPDU and APDU layers of BACnet/IP
//! traffic for the four services a discovery-and-property client needs:
//! Who-Is, I-Am, ReadProperty and WriteProperty, together with the
//! Simple-ACK, Complex-ACK, Error, Reject and Abort responses.
//!
//! The crate is `no_std` with `alloc`. Tag and header codecs write into a
//! caller-owned buffer; [`frame::encode`] and [`frame::decode`] are the
//! allocating entry points used by the transport and client layers.
//!
//! # Feature flags
//!
//! - **`std`** (default): enables `std::error::Error` implementations.
//! - **`serde`**: derives `Serialize`/`Deserialize` on data model types.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// APDU headers for confirmed/unconfirmed requests and their responses.
pub mod apdu;
/// Binary encoding primitives, tag system, and bounded reader/writer.
pub mod encoding;
/// Error types for encoding and decoding operations.
pub mod error;
/// Whole-frame encode/decode (NPDU + APDU).
pub mod frame;
/// NPDU (Network Protocol Data Unit) encoding and decoding.
pub mod npdu;
/// Service request and response codecs.
pub mod services;
/// Data model: object and device identifiers, properties, and values.
pub mod types;

pub use error::{DecodeError, EncodeError};
pub use frame::{decode, encode, encode_routed, ParsedFrame, Pdu};
