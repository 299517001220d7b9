/// Encode/decode functions for BACnet primitive and application data types.
pub mod primitives;
/// Bounded byte reader for decoding frames.
pub mod reader;
/// BACnet tag system (application, context, opening/closing).
pub mod tag;
/// Byte writer for encoding frames into a caller-owned buffer.
pub mod writer;
