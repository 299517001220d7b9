//! Async BACnet/IP client.
//!
//! [`BacnetClient`] discovers devices with Who-Is/I-Am and reads and writes
//! properties with confirmed ReadProperty/WriteProperty requests. Invoke IDs,
//! timeouts and retransmissions are handled by the [`RequestTracker`]; devices
//! that announced themselves live in the [`DeviceRegistry`].
//!
//! ```no_run
//! use bacwire_client::{BacnetClient, ClientConfig};
//! use bacwire_core::types::{ObjectId, ObjectType};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), bacwire_client::ClientError> {
//! let client = BacnetClient::new(ClientConfig::default());
//! client.connect().await?;
//! for device in client.whois(Duration::from_secs(3)).await? {
//!     let av = ObjectId::new(ObjectType::AnalogValue, 1);
//!     let value = client.read_present_value(device.instance, av).await?;
//!     println!("{}: {value}", device.instance);
//! }
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod simulator;
pub mod tracker;

pub use client::{BacnetClient, PendingCall, DEFAULT_WRITE_PRIORITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use discovery::{DeviceInfo, DeviceProperties, DiscoveredDevice};
pub use error::{ClientError, ErrorKind, Rejection};
pub use registry::DeviceRegistry;
pub use simulator::SimulatedDevice;
pub use tracker::{RequestKey, RequestState, RequestTracker};
