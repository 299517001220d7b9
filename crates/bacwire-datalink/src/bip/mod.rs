pub mod bvlc;
pub mod transport;
