use crate::{Address, ForeignDevice};
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur at the data-link layer.
#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data link is not open")]
    NotOpen,
    #[error("frame too large")]
    FrameTooLarge,
    #[error("invalid frame")]
    InvalidFrame,
    #[error("unsupported BVLC function 0x{0:02x}")]
    UnsupportedBvlcFunction(u8),
    #[error("BVLC result code 0x{0:04x}")]
    BvlcResult(u16),
    #[error("bbmd not configured")]
    BbmdNotConfigured,
}

/// Byte-oriented transport for NPDUs.
///
/// Implementors include [`BacnetIpTransport`](crate::BacnetIpTransport) for
/// BACnet/IP over UDP; tests substitute in-memory links. Futures are `Send`
/// so a link shared through an `Arc` can be driven from spawned tasks.
pub trait DataLink: Send + Sync + 'static {
    /// Acquires the underlying resources. Opening an open link is a no-op.
    fn open(&self) -> impl Future<Output = Result<(), DataLinkError>> + Send;

    /// Releases the underlying resources. The link may be opened again.
    fn close(&self);

    /// Sends `payload` to `address`.
    fn send(
        &self,
        address: &Address,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), DataLinkError>> + Send;

    /// Sends `payload` to every device on the local network.
    fn broadcast(&self, payload: &[u8]) -> impl Future<Output = Result<(), DataLinkError>> + Send;

    /// Receives one NPDU into `buf`, returning `(bytes_read, source_address)`.
    fn recv(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(usize, Address), DataLinkError>> + Send;

    /// BBMD registration this link performs, if any.
    fn foreign_device(&self) -> Option<ForeignDevice> {
        None
    }

    /// Sends Register-Foreign-Device to the BBMD.
    fn register_foreign_device(&self) -> impl Future<Output = Result<(), DataLinkError>> + Send {
        async { Err(DataLinkError::BbmdNotConfigured) }
    }
}
