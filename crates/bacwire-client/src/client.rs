use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::discovery::{DeviceInfo, DeviceProperties, DiscoveredDevice};
use crate::error::{ClientError, ErrorKind};
use crate::registry::DeviceRegistry;
use crate::tracker::{Outcome, RequestKey, RequestTracker, TrackerError};
use bacwire_core::services::{
    ReadPropertyRequest, WhoIsRequest, WritePropertyRequest, SERVICE_READ_PROPERTY,
    SERVICE_WRITE_PROPERTY,
};
use bacwire_core::types::{DeviceInstance, ErrorCode, ObjectId, PropertyId, PropertyValue};
use bacwire_core::{encode, encode_routed, DecodeError, Pdu};
use bacwire_datalink::{
    Address, BacnetIpTransport, DataLink, DataLinkError, Incoming, ReceiveLoop,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Priority used by [`BacnetClient::write_present_value`].
pub const DEFAULT_WRITE_PRIORITY: u8 = 8;

/// Async BACnet/IP client.
///
/// All operations take `&self` and may run concurrently. Nothing touches the
/// network until [`connect`](Self::connect).
pub struct BacnetClient<D: DataLink = BacnetIpTransport> {
    config: ClientConfig,
    datalink: Arc<D>,
    clock: Arc<dyn Clock>,
    tracker: Arc<RequestTracker>,
    registry: Arc<DeviceRegistry>,
    lifecycle: tokio::sync::Mutex<()>,
    session: Mutex<Option<Session>>,
}

/// Background tasks alive while connected.
#[derive(Debug)]
struct Session {
    _receive_loop: ReceiveLoop,
    dispatcher: JoinHandle<()>,
    ticker: JoinHandle<()>,
    _renewal: Option<ForeignDeviceRenewal>,
}

// The receive loop and renewal abort their own tasks when dropped.
impl Drop for Session {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.ticker.abort();
    }
}

/// Re-registers with the BBMD at three quarters of the TTL.
#[derive(Debug)]
struct ForeignDeviceRenewal {
    task: JoinHandle<()>,
}

impl ForeignDeviceRenewal {
    fn spawn<D: DataLink>(datalink: Arc<D>, ttl_seconds: u16) -> Self {
        let refresh_seconds = u64::from(ttl_seconds).saturating_mul(3) / 4;
        let interval = Duration::from_secs(refresh_seconds.max(1));
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(err) = datalink.register_foreign_device().await {
                    log::warn!("foreign device renewal send failed: {err}");
                }
            }
        });
        Self { task }
    }
}

impl Drop for ForeignDeviceRenewal {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A confirmed request in flight.
///
/// The protocol timeout and retries run regardless of how long the caller
/// waits; [`cancel`](Self::cancel) stops them.
#[derive(Debug)]
pub struct PendingCall<T> {
    key: RequestKey,
    receiver: Option<oneshot::Receiver<Outcome>>,
    tracker: Arc<RequestTracker>,
    map: fn(Pdu) -> Result<T, ClientError>,
}

impl<T> PendingCall<T> {
    pub fn key(&self) -> RequestKey {
        self.key
    }

    /// Waits until the request completes, fails, times out or is cancelled.
    pub async fn wait(mut self) -> Result<T, ClientError> {
        match self.receiver.take() {
            Some(receiver) => self.finish(receiver.await),
            None => Err(ErrorKind::Cancelled.into()),
        }
    }

    /// Waits at most `timeout`. On expiry the caller gets
    /// [`ErrorKind::Timeout`] but the request stays in flight and may be
    /// waited on again. Once a result was returned, further calls report
    /// [`ErrorKind::Cancelled`].
    pub async fn wait_for(&mut self, timeout: Duration) -> Result<T, ClientError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(ErrorKind::Cancelled.into());
        };
        match tokio::time::timeout(timeout, receiver).await {
            Ok(result) => {
                self.receiver = None;
                self.finish(result)
            }
            Err(_) => Err(ErrorKind::Timeout.into()),
        }
    }

    /// Cancels the request and stops its retries. Returns `false` if it had
    /// already finished.
    pub fn cancel(mut self) -> bool {
        self.receiver = None;
        self.tracker.cancel(&self.key)
    }

    fn finish(&self, result: Result<Outcome, oneshot::error::RecvError>) -> Result<T, ClientError> {
        match result {
            Ok(Ok(pdu)) => (self.map)(pdu),
            Ok(Err(kind)) => Err(kind.into()),
            Err(_) => Err(ErrorKind::Cancelled.into()),
        }
    }
}

fn read_ack_value(pdu: Pdu) -> Result<PropertyValue, ClientError> {
    match pdu {
        Pdu::ReadPropertyAck(ack) => Ok(ack.value),
        _ => Err(ClientError::UnsupportedResponse),
    }
}

fn simple_ack(pdu: Pdu) -> Result<(), ClientError> {
    match pdu {
        Pdu::SimpleAck(_) => Ok(()),
        _ => Err(ClientError::UnsupportedResponse),
    }
}

impl BacnetClient<BacnetIpTransport> {
    /// Client over BACnet/IP configured by `config.transport`.
    pub fn new(config: ClientConfig) -> Self {
        let datalink = Arc::new(BacnetIpTransport::new(config.transport));
        Self::with_datalink(config, datalink)
    }

    /// Local socket address while connected.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ClientError> {
        Ok(self.datalink.local_addr()?)
    }
}

impl<D: DataLink> BacnetClient<D> {
    pub fn with_datalink(config: ClientConfig, datalink: Arc<D>) -> Self {
        Self::with_clock(config, datalink, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ClientConfig, datalink: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracker: Arc::new(RequestTracker::new(clock.clone())),
            registry: Arc::new(DeviceRegistry::new(clock.clone())),
            config,
            datalink,
            clock,
            lifecycle: tokio::sync::Mutex::new(()),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn datalink(&self) -> &Arc<D> {
        &self.datalink
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ErrorKind::NotConnected.into())
        }
    }

    /// Opens the link, registers with the BBMD when one is configured and
    /// starts the background tasks. Connecting twice is a no-op.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        self.datalink.open().await?;
        let renewal = match self.datalink.foreign_device() {
            Some(fd) => {
                if let Err(err) = self.datalink.register_foreign_device().await {
                    log::warn!("foreign device registration with {} failed: {err}", fd.bbmd);
                    self.datalink.close();
                    return Err(err.into());
                }
                Some(ForeignDeviceRenewal::spawn(
                    self.datalink.clone(),
                    fd.ttl_seconds,
                ))
            }
            None => None,
        };

        let (receive_loop, incoming) =
            ReceiveLoop::spawn(self.datalink.clone(), self.config.incoming_queue);
        let dispatcher = tokio::spawn(dispatch(
            incoming,
            self.tracker.clone(),
            self.registry.clone(),
        ));
        let ticker = tokio::spawn(expire(
            self.datalink.clone(),
            self.tracker.clone(),
            self.config.effective_tick_interval(),
        ));

        *self.session() = Some(Session {
            _receive_loop: receive_loop,
            dispatcher,
            ticker,
            _renewal: renewal,
        });
        log::info!("bacnet client connected");
        Ok(())
    }

    /// Cancels in-flight requests, stops the background tasks and closes
    /// the link. Safe to call at any time.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let session = self.session().take();
        let cancelled = self.tracker.cancel_all();
        if let Some(session) = session {
            drop(session);
            self.datalink.close();
            log::info!("bacnet client disconnected ({cancelled} requests cancelled)");
        }
    }

    /// Broadcasts a global Who-Is and returns the devices that answered
    /// within `timeout`.
    pub async fn whois(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ClientError> {
        self.discover(WhoIsRequest::global(), timeout).await
    }

    /// Who-Is limited to instances `low..=high`.
    pub async fn whois_range(
        &self,
        low: u32,
        high: u32,
        timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>, ClientError> {
        self.discover(WhoIsRequest::range(low, high)?, timeout).await
    }

    async fn discover(
        &self,
        request: WhoIsRequest,
        timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>, ClientError> {
        self.ensure_connected()?;
        let frame = encode(&Pdu::WhoIs(request))?;
        let started = self.clock.now();
        self.datalink.broadcast(&frame).await?;
        log::debug!("who-is sent ({request:?})");
        tokio::time::sleep(timeout).await;
        Ok(self
            .registry
            .seen_since(started)
            .into_iter()
            .filter(|device| request.matches(device.instance.get()))
            .collect())
    }

    /// Adds a device whose address is already known.
    pub fn register_device(&self, instance: DeviceInstance, address: Address) -> DiscoveredDevice {
        self.registry.register(instance, address)
    }

    pub fn device(&self, instance: DeviceInstance) -> Option<DiscoveredDevice> {
        self.registry.lookup(instance)
    }

    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.registry.all()
    }

    fn resolve(&self, device: DeviceInstance) -> Result<Address, ClientError> {
        self.ensure_connected()?;
        self.registry
            .lookup(device)
            .map(|d| d.address)
            .ok_or(ClientError::UnknownDevice(device))
    }

    async fn start<T>(
        &self,
        destination: Address,
        service_choice: u8,
        build: impl FnOnce(u8) -> Pdu,
        map: fn(Pdu) -> Result<T, ClientError>,
    ) -> Result<PendingCall<T>, ClientError> {
        self.ensure_connected()?;
        let submission = self
            .tracker
            .submit(
                destination,
                service_choice,
                self.config.request_timeout,
                self.config.max_retries,
                |invoke_id| encode_routed(&build(invoke_id), destination.remote()),
            )
            .map_err(|err| match err {
                TrackerError::Exhausted(destination) => {
                    ClientError::ResourceExhausted { destination }
                }
                TrackerError::Encode(err) => ClientError::Encode(err),
            })?;
        let call = PendingCall {
            key: submission.key,
            receiver: Some(submission.receiver),
            tracker: self.tracker.clone(),
            map,
        };

        // A disconnect may have run cancel_all between the check and submit.
        if !self.is_connected() {
            self.tracker.cancel(&call.key);
            return Err(ErrorKind::Cancelled.into());
        }

        if let Err(err) = self.datalink.send(&destination, &submission.frame).await {
            self.tracker.abandon(&call.key);
            if !self.is_connected() {
                log::debug!("request to {destination} dropped by disconnect: {err}");
                return Err(ErrorKind::Cancelled.into());
            }
            return Err(err.into());
        }
        log::debug!(
            "request {} (service {service_choice}) sent to {destination}",
            call.key.invoke_id
        );
        Ok(call)
    }

    /// Starts a ReadProperty without waiting for the answer.
    pub async fn start_read_property(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
        property_id: PropertyId,
    ) -> Result<PendingCall<PropertyValue>, ClientError> {
        let address = self.resolve(device)?;
        self.start_read_property_at(&address, object_id, property_id, None)
            .await
    }

    async fn start_read_property_at(
        &self,
        address: &Address,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
    ) -> Result<PendingCall<PropertyValue>, ClientError> {
        self.start(
            *address,
            SERVICE_READ_PROPERTY,
            |invoke_id| {
                Pdu::ReadProperty(ReadPropertyRequest {
                    object_id,
                    property_id,
                    array_index,
                    invoke_id,
                })
            },
            read_ack_value,
        )
        .await
    }

    pub async fn read_property(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
        property_id: PropertyId,
    ) -> Result<PropertyValue, ClientError> {
        let address = self.resolve(device)?;
        self.read_property_at(&address, object_id, property_id, None)
            .await
    }

    /// Reads one element of an array property; index 0 is the length.
    pub async fn read_property_array_index(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: u32,
    ) -> Result<PropertyValue, ClientError> {
        let address = self.resolve(device)?;
        self.read_property_at(&address, object_id, property_id, Some(array_index))
            .await
    }

    /// ReadProperty addressed directly, bypassing the registry.
    pub async fn read_property_at(
        &self,
        address: &Address,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
    ) -> Result<PropertyValue, ClientError> {
        self.start_read_property_at(address, object_id, property_id, array_index)
            .await?
            .wait()
            .await
    }

    /// Writes `value`; `priority` 1–16, `None` for non-commandable properties.
    pub async fn write_property(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
        property_id: PropertyId,
        value: PropertyValue,
        priority: Option<u8>,
    ) -> Result<(), ClientError> {
        let address = self.resolve(device)?;
        self.write_property_at(&address, object_id, property_id, None, value, priority)
            .await
    }

    /// WriteProperty addressed directly, bypassing the registry.
    pub async fn write_property_at(
        &self,
        address: &Address,
        object_id: ObjectId,
        property_id: PropertyId,
        array_index: Option<u32>,
        value: PropertyValue,
        priority: Option<u8>,
    ) -> Result<(), ClientError> {
        self.start(
            *address,
            SERVICE_WRITE_PROPERTY,
            move |invoke_id| {
                Pdu::WriteProperty(WritePropertyRequest {
                    object_id,
                    property_id,
                    array_index,
                    value,
                    priority,
                    invoke_id,
                })
            },
            simple_ack,
        )
        .await?
        .wait()
        .await
    }

    /// Reads a numeric Present_Value.
    pub async fn read_present_value(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
    ) -> Result<f64, ClientError> {
        let value = self
            .read_property(device, object_id, PropertyId::PresentValue)
            .await?;
        value.as_f64().ok_or(ClientError::UnexpectedValue(value))
    }

    /// Writes a REAL Present_Value at [`DEFAULT_WRITE_PRIORITY`].
    pub async fn write_present_value(
        &self,
        device: DeviceInstance,
        object_id: ObjectId,
        value: f32,
    ) -> Result<(), ClientError> {
        self.write_property(
            device,
            object_id,
            PropertyId::PresentValue,
            PropertyValue::Real(value),
            Some(DEFAULT_WRITE_PRIORITY),
        )
        .await
    }

    /// Reads the identifying properties of a device's Device object and
    /// caches them in the registry.
    pub async fn get_device_info(&self, device: DeviceInstance) -> Result<DeviceInfo, ClientError> {
        let address = self.resolve(device)?;
        let object_id = device.object_id();
        let object_name = self.read_string(&address, object_id, PropertyId::ObjectName).await?;
        let vendor_name = self.read_string(&address, object_id, PropertyId::VendorName).await?;
        let model_name = self.read_string(&address, object_id, PropertyId::ModelName).await?;
        let description = match self.read_string(&address, object_id, PropertyId::Description).await
        {
            Ok(text) => Some(text),
            Err(err)
                if err.rejection().and_then(|r| r.error_code())
                    == Some(ErrorCode::UnknownProperty) =>
            {
                None
            }
            Err(err) => return Err(err),
        };

        let info = DeviceInfo {
            instance: device,
            address,
            object_name,
            vendor_name,
            model_name,
            description,
        };
        self.registry
            .update_properties(device, DeviceProperties::from(&info));
        Ok(info)
    }

    async fn read_string(
        &self,
        address: &Address,
        object_id: ObjectId,
        property_id: PropertyId,
    ) -> Result<String, ClientError> {
        let value = self
            .read_property_at(address, object_id, property_id, None)
            .await?;
        match value {
            PropertyValue::CharacterString(text) => Ok(text),
            other => Err(ClientError::UnexpectedValue(other)),
        }
    }
}

impl<D: DataLink> Drop for BacnetClient<D> {
    fn drop(&mut self) {
        let session = self.session().take();
        if let Some(session) = session {
            self.tracker.cancel_all();
            drop(session);
            self.datalink.close();
        }
    }
}

impl<D: DataLink> std::fmt::Debug for BacnetClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacnetClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("tracker", &self.tracker)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Decodes inbound datagrams and routes them to the registry or tracker.
async fn dispatch(mut incoming: Incoming, tracker: Arc<RequestTracker>, registry: Arc<DeviceRegistry>) {
    while let Some(datagram) = incoming.recv().await {
        let frame = match bacwire_core::decode(&datagram.payload) {
            Ok(frame) => frame,
            Err(DecodeError::Unsupported) => {
                log::debug!("ignoring unsupported frame from {}", datagram.source);
                continue;
            }
            Err(err) => {
                log::warn!("dropping undecodable frame from {}: {err}", datagram.source);
                continue;
            }
        };
        let source = datagram.source.with_remote(frame.source);
        match frame.pdu {
            Pdu::IAm(i_am) => {
                if registry.record_i_am(&i_am, source).is_none() {
                    log::debug!("ignoring i-am for non-device object {}", i_am.device_id);
                }
            }
            pdu if pdu.is_response() => {
                if let Some(invoke_id) = pdu.invoke_id() {
                    tracker.complete(invoke_id, &source, pdu);
                }
            }
            other => log::debug!("ignoring {other:?} from {source}"),
        }
    }
}

/// Periodically fails or retransmits requests whose deadline has passed.
async fn expire<D: DataLink>(datalink: Arc<D>, tracker: Arc<RequestTracker>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        for retry in tracker.poll_expired() {
            if let Err(err) = datalink.send(&retry.key.destination, &retry.frame).await {
                log_retransmit_failure(&retry.key, &err);
            }
        }
    }
}

fn log_retransmit_failure(key: &RequestKey, err: &DataLinkError) {
    log::warn!(
        "retransmission of request {} to {} failed: {err}",
        key.invoke_id,
        key.destination
    );
}
