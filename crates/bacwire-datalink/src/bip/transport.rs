use crate::bip::bvlc::{wrap, Bvll, BvlcFunction, MAX_BIP_FRAME_LEN};
use crate::{Address, DataLink, DataLinkError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::UdpSocket;

/// Registration with a BBMD as a foreign device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForeignDevice {
    pub bbmd: SocketAddr,
    pub ttl_seconds: u16,
}

impl ForeignDevice {
    pub const DEFAULT_TTL_SECONDS: u16 = 900;

    pub const fn new(bbmd: SocketAddr) -> Self {
        Self {
            bbmd,
            ttl_seconds: Self::DEFAULT_TTL_SECONDS,
        }
    }

    pub const fn with_ttl(mut self, ttl_seconds: u16) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    pub bind_addr: SocketAddr,
    pub broadcast_addr: SocketAddr,
    pub foreign_device: Option<ForeignDevice>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                Address::BACNET_IP_DEFAULT_PORT,
            ),
            broadcast_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::BROADCAST),
                Address::BACNET_IP_DEFAULT_PORT,
            ),
            foreign_device: None,
        }
    }
}

/// BACnet/IP over one UDP socket.
///
/// Construction does no I/O; the socket is bound by [`DataLink::open`] and
/// released by [`DataLink::close`].
#[derive(Debug)]
pub struct BacnetIpTransport {
    config: TransportConfig,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl BacnetIpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            socket: Mutex::new(None),
        }
    }

    /// Builds a transport on `bind_addr` and opens it.
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self, DataLinkError> {
        let transport = Self::new(TransportConfig {
            bind_addr,
            ..TransportConfig::default()
        });
        transport.open().await?;
        Ok(transport)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    /// The bound address; useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, DataLinkError> {
        self.socket()?.local_addr().map_err(DataLinkError::Io)
    }

    pub fn bbmd_addr(&self) -> Option<SocketAddr> {
        self.config.foreign_device.map(|fd| fd.bbmd)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<UdpSocket>>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, DataLinkError> {
        self.slot().clone().ok_or(DataLinkError::NotOpen)
    }

    async fn send_frame(
        &self,
        function: BvlcFunction,
        payload: &[u8],
        target: SocketAddr,
    ) -> Result<(), DataLinkError> {
        let socket = self.socket()?;
        let frame = wrap(function, payload)?;
        socket.send_to(&frame, target).await?;
        Ok(())
    }
}

impl DataLink for BacnetIpTransport {
    async fn open(&self) -> Result<(), DataLinkError> {
        if self.is_open() {
            return Ok(());
        }
        let addr = self.config.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DataLinkError::Bind { addr, source })?;
        socket.set_broadcast(true)?;
        let local = socket.local_addr()?;
        let mut slot = self.slot();
        if slot.is_none() {
            log::debug!("bacnet/ip transport bound to {local}");
            *slot = Some(Arc::new(socket));
        }
        Ok(())
    }

    fn close(&self) {
        if self.slot().take().is_some() {
            log::debug!("bacnet/ip transport closed");
        }
    }

    async fn send(&self, address: &Address, payload: &[u8]) -> Result<(), DataLinkError> {
        self.send_frame(
            BvlcFunction::OriginalUnicastNpdu,
            payload,
            address.socket_addr(),
        )
        .await
    }

    async fn broadcast(&self, payload: &[u8]) -> Result<(), DataLinkError> {
        match self.config.foreign_device {
            Some(fd) => {
                self.send_frame(BvlcFunction::DistributeBroadcastToNetwork, payload, fd.bbmd)
                    .await
            }
            None => {
                self.send_frame(
                    BvlcFunction::OriginalBroadcastNpdu,
                    payload,
                    self.config.broadcast_addr,
                )
                .await
            }
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Address), DataLinkError> {
        let socket = self.socket()?;
        let mut frame = [0u8; MAX_BIP_FRAME_LEN + 1];
        loop {
            let (n, src) = socket.recv_from(&mut frame).await?;
            match Bvll::parse(&frame[..n])? {
                Bvll::Npdu { payload, origin } => {
                    if payload.len() > buf.len() {
                        return Err(DataLinkError::FrameTooLarge);
                    }
                    buf[..payload.len()].copy_from_slice(payload);
                    return Ok((payload.len(), Address::ip(origin.unwrap_or(src))));
                }
                Bvll::Result(0) => log::debug!("BVLC-Result success from {src}"),
                Bvll::Result(code) => log::warn!("BVLC-Result 0x{code:04x} from {src}"),
                Bvll::Control(function) => log::debug!("ignoring BVLC {function:?} from {src}"),
            }
        }
    }

    fn foreign_device(&self) -> Option<ForeignDevice> {
        self.config.foreign_device
    }

    /// Sends Register-Foreign-Device with the configured TTL. The BBMD's
    /// BVLC-Result arrives through [`DataLink::recv`], which logs it.
    async fn register_foreign_device(&self) -> Result<(), DataLinkError> {
        let fd = self
            .config
            .foreign_device
            .ok_or(DataLinkError::BbmdNotConfigured)?;
        self.send_frame(
            BvlcFunction::RegisterForeignDevice,
            &fd.ttl_seconds.to_be_bytes(),
            fd.bbmd,
        )
        .await?;
        log::debug!(
            "sent foreign device registration to {} (ttl {}s)",
            fd.bbmd,
            fd.ttl_seconds
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BacnetIpTransport, ForeignDevice, TransportConfig};
    use crate::bip::bvlc::{BvlcFunction, BvlcHeader, BVLC_TYPE_BIP};
    use crate::{Address, DataLink, DataLinkError};
    use bacwire_core::encoding::{reader::Reader, writer::Writer};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::net::UdpSocket;

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    async fn foreign_transport(bbmd_addr: SocketAddr) -> BacnetIpTransport {
        let transport = BacnetIpTransport::new(TransportConfig {
            bind_addr: localhost(),
            foreign_device: Some(ForeignDevice::new(bbmd_addr).with_ttl(90)),
            ..TransportConfig::default()
        });
        transport.open().await.unwrap();
        transport
    }

    #[tokio::test]
    async fn recv_forwarded_npdu_returns_forwarded_origin() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        let target = transport.local_addr().unwrap();
        let sender = UdpSocket::bind(localhost()).await.unwrap();

        let mut frame = [0u8; 64];
        let mut w = Writer::new(&mut frame);
        BvlcHeader {
            function: BvlcFunction::ForwardedNpdu,
            length: 4 + 6 + 3,
        }
        .encode(&mut w)
        .unwrap();
        w.write_all(&[10, 1, 2, 3]).unwrap();
        w.write_be_u16(47808).unwrap();
        w.write_all(&[1, 2, 3]).unwrap();

        sender.send_to(w.as_written(), target).await.unwrap();

        let mut out = [0u8; 16];
        let (n, src) = transport.recv(&mut out).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(src, Address::ip("10.1.2.3:47808".parse().unwrap()));
    }

    #[tokio::test]
    async fn unicast_send_uses_original_unicast() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        let peer = UdpSocket::bind(localhost()).await.unwrap();

        transport
            .send(&Address::ip(peer.local_addr().unwrap()), &[0x01, 0x00])
            .await
            .unwrap();

        let mut recv = [0u8; 16];
        let (n, src) = peer.recv_from(&mut recv).await.unwrap();
        assert_eq!(&recv[..n], &[BVLC_TYPE_BIP, 0x0A, 0x00, 0x06, 0x01, 0x00]);
        assert_eq!(src, transport.local_addr().unwrap());
    }

    #[tokio::test]
    async fn broadcast_goes_to_configured_address() {
        let listener = UdpSocket::bind(localhost()).await.unwrap();
        let transport = BacnetIpTransport::new(TransportConfig {
            bind_addr: localhost(),
            broadcast_addr: listener.local_addr().unwrap(),
            foreign_device: None,
        });
        transport.open().await.unwrap();

        transport.broadcast(&[0x01, 0x00, 0x10, 0x08]).await.unwrap();

        let mut recv = [0u8; 16];
        let (n, _) = listener.recv_from(&mut recv).await.unwrap();
        let mut r = Reader::new(&recv[..n]);
        let hdr = BvlcHeader::decode(&mut r).unwrap();
        assert_eq!(hdr.function, BvlcFunction::OriginalBroadcastNpdu);
        assert_eq!(r.rest(), &[0x01, 0x00, 0x10, 0x08]);
    }

    #[tokio::test]
    async fn broadcast_uses_distribute_to_network_when_bbmd_configured() {
        let bbmd = UdpSocket::bind(localhost()).await.unwrap();
        let transport = foreign_transport(bbmd.local_addr().unwrap()).await;

        transport.broadcast(&[1, 2, 3]).await.unwrap();

        let mut recv = [0u8; 64];
        let (n, _) = bbmd.recv_from(&mut recv).await.unwrap();
        let mut r = Reader::new(&recv[..n]);
        let hdr = BvlcHeader::decode(&mut r).unwrap();
        assert_eq!(hdr.function, BvlcFunction::DistributeBroadcastToNetwork);
    }

    #[tokio::test]
    async fn register_foreign_device_sends_ttl() {
        let bbmd = UdpSocket::bind(localhost()).await.unwrap();
        let transport = foreign_transport(bbmd.local_addr().unwrap()).await;

        transport.register_foreign_device().await.unwrap();

        let mut recv = [0u8; 64];
        let (n, _) = bbmd.recv_from(&mut recv).await.unwrap();
        let mut r = Reader::new(&recv[..n]);
        let hdr = BvlcHeader::decode(&mut r).unwrap();
        assert_eq!(hdr.function, BvlcFunction::RegisterForeignDevice);
        assert_eq!(r.read_be_u16().unwrap(), 90);
    }

    #[tokio::test]
    async fn register_without_bbmd_fails() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        assert!(matches!(
            transport.register_foreign_device().await,
            Err(DataLinkError::BbmdNotConfigured)
        ));
    }

    #[tokio::test]
    async fn bvlc_result_is_skipped() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        let target = transport.local_addr().unwrap();
        let sender = UdpSocket::bind(localhost()).await.unwrap();

        sender
            .send_to(&[BVLC_TYPE_BIP, 0x00, 0x00, 0x06, 0x00, 0x30], target)
            .await
            .unwrap();
        sender
            .send_to(&[BVLC_TYPE_BIP, 0x0A, 0x00, 0x06, 0x01, 0x00], target)
            .await
            .unwrap();

        let mut out = [0u8; 16];
        let (n, src) = transport.recv(&mut out).await.unwrap();
        assert_eq!(&out[..n], &[0x01, 0x00]);
        assert_eq!(src.socket_addr(), sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn unknown_bvlc_function_errors() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        let target = transport.local_addr().unwrap();
        let sender = UdpSocket::bind(localhost()).await.unwrap();

        let frame = [BVLC_TYPE_BIP, 0x99, 0x00, 0x04];
        sender.send_to(&frame, target).await.unwrap();

        let mut out = [0u8; 16];
        let err = transport.recv(&mut out).await.unwrap_err();
        assert!(matches!(err, DataLinkError::UnsupportedBvlcFunction(0x99)));
    }

    #[tokio::test]
    async fn bind_conflict_reports_address() {
        let taken = UdpSocket::bind(localhost()).await.unwrap();
        let addr = taken.local_addr().unwrap();
        let transport = BacnetIpTransport::new(TransportConfig {
            bind_addr: addr,
            ..TransportConfig::default()
        });
        match transport.open().await {
            Err(DataLinkError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn close_releases_socket_and_reopen_works() {
        let transport = BacnetIpTransport::bind(localhost()).await.unwrap();
        let addr = transport.local_addr().unwrap();
        transport.close();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.send(&Address::ip(addr), &[0x01]).await,
            Err(DataLinkError::NotOpen)
        ));

        // The port is free again.
        let rebound = UdpSocket::bind(addr).await.unwrap();
        drop(rebound);

        transport.open().await.unwrap();
        assert!(transport.is_open());
    }
}
