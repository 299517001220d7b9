//! Shared argument handling for the bacwire command-line tools.

use bacwire_client::{BacnetClient, ClientConfig, ClientError, DiscoveredDevice};
use bacwire_core::types::{DeviceInstance, ObjectType, PropertyId, PropertyValue};
use bacwire_datalink::{Address, ForeignDevice};
use clap::{Args, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

/// CLI-friendly enum for selecting BACnet object types.
///
/// Maps human-readable names to [`ObjectType`] variants for use with clap argument parsing.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ObjectTypeArg {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    Device,
    MultiStateInput,
    MultiStateOutput,
    MultiStateValue,
}

impl ObjectTypeArg {
    /// Convert to the core [`ObjectType`] representation.
    pub const fn into_object_type(self) -> ObjectType {
        match self {
            Self::AnalogInput => ObjectType::AnalogInput,
            Self::AnalogOutput => ObjectType::AnalogOutput,
            Self::AnalogValue => ObjectType::AnalogValue,
            Self::BinaryInput => ObjectType::BinaryInput,
            Self::BinaryOutput => ObjectType::BinaryOutput,
            Self::BinaryValue => ObjectType::BinaryValue,
            Self::Device => ObjectType::Device,
            Self::MultiStateInput => ObjectType::MultiStateInput,
            Self::MultiStateOutput => ObjectType::MultiStateOutput,
            Self::MultiStateValue => ObjectType::MultiStateValue,
        }
    }
}

/// Application type of a value given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    Real,
    Unsigned,
    Boolean,
    Enumerated,
    Null,
}

impl ValueKind {
    /// Parses `raw` as this kind. `Null` ignores `raw`.
    pub fn parse(self, raw: Option<&str>) -> Result<PropertyValue, String> {
        if self == Self::Null {
            return Ok(PropertyValue::Null);
        }
        let raw = raw.ok_or_else(|| format!("a {self:?} value needs --value"))?;
        let invalid = || format!("'{raw}' is not a valid {self:?} value");
        Ok(match self {
            Self::Real => PropertyValue::Real(raw.parse().map_err(|_| invalid())?),
            Self::Unsigned => PropertyValue::Unsigned(raw.parse().map_err(|_| invalid())?),
            Self::Enumerated => PropertyValue::Enumerated(raw.parse().map_err(|_| invalid())?),
            Self::Boolean => PropertyValue::Boolean(match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "active" => true,
                "false" | "0" | "off" | "inactive" => false,
                _ => return Err(invalid()),
            }),
            Self::Null => PropertyValue::Null,
        })
    }
}

/// Parses a property name such as `present-value` or a raw property number.
pub fn parse_property(raw: &str) -> Result<PropertyId, String> {
    if let Ok(number) = raw.parse::<u32>() {
        return Ok(PropertyId::from_u32(number));
    }
    let id = match raw.to_ascii_lowercase().replace('_', "-").as_str() {
        "application-software-version" => PropertyId::ApplicationSoftwareVersion,
        "description" => PropertyId::Description,
        "firmware-revision" => PropertyId::FirmwareRevision,
        "model-name" => PropertyId::ModelName,
        "object-identifier" => PropertyId::ObjectIdentifier,
        "object-list" => PropertyId::ObjectList,
        "object-name" => PropertyId::ObjectName,
        "object-type" => PropertyId::ObjectType,
        "out-of-service" => PropertyId::OutOfService,
        "present-value" => PropertyId::PresentValue,
        "priority-array" => PropertyId::PriorityArray,
        "relinquish-default" => PropertyId::RelinquishDefault,
        "status-flags" => PropertyId::StatusFlags,
        "units" => PropertyId::Units,
        "vendor-identifier" => PropertyId::VendorIdentifier,
        "vendor-name" => PropertyId::VendorName,
        other => return Err(format!("unknown property '{other}'")),
    };
    Ok(id)
}

/// Network options shared by every client tool.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Local address to bind.
    #[arg(long, env = "BACNET_BIND", default_value = "0.0.0.0:47808")]
    pub bind: SocketAddr,
    /// Destination of local broadcasts.
    #[arg(long, env = "BACNET_BROADCAST", default_value = "255.255.255.255:47808")]
    pub broadcast: SocketAddr,
    /// Register as a foreign device with this BBMD.
    #[arg(long, env = "BACNET_BBMD_ADDRESS")]
    pub bbmd: Option<SocketAddr>,
    #[arg(long, env = "BACNET_BBMD_TTL", default_value_t = ForeignDevice::DEFAULT_TTL_SECONDS)]
    pub foreign_ttl: u16,
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    pub timeout_ms: u64,
    /// Retransmissions after the first send.
    #[arg(long, default_value_t = 3)]
    pub retries: u8,
}

impl ConnectionArgs {
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default()
            .with_bind_addr(self.bind)
            .with_broadcast_addr(self.broadcast)
            .with_request_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_retries(self.retries);
        match self.bbmd {
            Some(bbmd) => {
                config.with_foreign_device(ForeignDevice::new(bbmd).with_ttl(self.foreign_ttl))
            }
            None => config,
        }
    }
}

/// Registers `device` at `at` when given, otherwise looks for it with a
/// targeted Who-Is.
pub async fn locate_device(
    client: &BacnetClient,
    device: DeviceInstance,
    at: Option<SocketAddr>,
    timeout: Duration,
) -> Result<DiscoveredDevice, ClientError> {
    if let Some(addr) = at {
        return Ok(client.register_device(device, Address::ip(addr)));
    }
    client
        .whois_range(device.get(), device.get(), timeout)
        .await?
        .into_iter()
        .next()
        .ok_or(ClientError::UnknownDevice(device))
}
