//! End-to-end check against a real device: device info, present-value
//! write/read-back cycles and error handling. Exits non-zero on failure.

use bacwire_client::{BacnetClient, ClientConfig, ClientError};
use bacwire_core::types::{DeviceInstance, ObjectId, ObjectType, PropertyId, PropertyValue};
use bacwire_datalink::{Address, ForeignDevice};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

const TOLERANCE: f64 = 0.01;
const CYCLE_VALUES: [f32; 5] = [10.0, 25.5, 50.0, 75.5, 100.0];
const MISSING_INSTANCE: u32 = 99_999;

#[derive(Parser, Debug)]
#[command(name = "bacnet-verify")]
struct Args {
    #[arg(long, env = "BACNET_DEVICE_IP")]
    device_ip: IpAddr,
    #[arg(long, env = "BACNET_DEVICE_ID")]
    device_id: u32,
    #[arg(long, env = "BACNET_DEVICE_PORT", default_value_t = 47808)]
    device_port: u16,
    #[arg(long, env = "BACNET_LOCAL_IP")]
    local_ip: IpAddr,
    #[arg(long, env = "BACNET_LOCAL_PORT", default_value_t = 47808)]
    local_port: u16,
    #[arg(long, env = "BACNET_BBMD_ADDRESS")]
    bbmd_address: Option<SocketAddr>,
    #[arg(long, env = "BACNET_BBMD_TTL", default_value_t = ForeignDevice::DEFAULT_TTL_SECONDS)]
    bbmd_ttl: u16,
    #[arg(long, env = "ANALOG_VALUE_INSTANCE", default_value_t = 1)]
    analog_value_instance: u32,
    #[arg(long, env = "ANALOG_VALUE_TEST_WRITE_VALUE", default_value_t = 75.5)]
    test_write_value: f32,
    /// Expected Units enumeration of the analog value, checked when set.
    #[arg(long, env = "ANALOG_VALUE_EXPECTED_UNITS")]
    expected_units: Option<u32>,
    #[arg(long, env = "TEST_RETRY_COUNT", default_value_t = 3)]
    retry_count: u32,
    #[arg(long, env = "TEST_RETRY_DELAY", default_value_t = 2)]
    retry_delay_secs: u64,
    /// Upper bound for the whole run, in seconds.
    #[arg(long, env = "TEST_TIMEOUT", default_value_t = 30)]
    timeout_secs: u64,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default()
            .with_bind_addr(SocketAddr::new(self.local_ip, self.local_port));
        match self.bbmd_address {
            Some(bbmd) => {
                config.with_foreign_device(ForeignDevice::new(bbmd).with_ttl(self.bbmd_ttl))
            }
            None => config,
        }
    }
}

/// Pass/fail tally printed at the end.
#[derive(Debug, Default)]
struct Report {
    passed: usize,
    failed: Vec<String>,
}

impl Report {
    fn check(&mut self, name: &str, result: Result<String, String>) {
        match result {
            Ok(detail) => {
                self.passed += 1;
                println!("PASS {name}: {detail}");
            }
            Err(why) => {
                println!("FAIL {name}: {why}");
                self.failed.push(name.to_string());
            }
        }
    }
}

struct Harness {
    client: BacnetClient,
    device: DeviceInstance,
    av: ObjectId,
    args: Args,
}

impl Harness {
    async fn read_pv(&self) -> Result<f64, ClientError> {
        self.client.read_present_value(self.device, self.av).await
    }

    async fn write_and_verify(&self, target: f32) -> Result<String, String> {
        self.client
            .write_present_value(self.device, self.av, target)
            .await
            .map_err(|e| format!("write {target} failed: {e}"))?;
        let read = self
            .read_pv()
            .await
            .map_err(|e| format!("read-back failed: {e}"))?;
        if (read - f64::from(target)).abs() < TOLERANCE {
            Ok(format!("wrote {target}, read {read}"))
        } else {
            Err(format!("wrote {target}, read {read}"))
        }
    }

    async fn read_text_or_unknown(&self, property: PropertyId) -> String {
        match self
            .client
            .read_property(self.device, self.device.object_id(), property)
            .await
        {
            Ok(PropertyValue::CharacterString(text)) => text,
            Ok(other) => other.to_string(),
            Err(e) => {
                log::warn!("could not read {property:?}: {e}");
                "Unknown".to_string()
            }
        }
    }

    async fn read_pv_with_retry(&self) -> Result<f64, String> {
        let attempts = self.args.retry_count.max(1);
        for attempt in 1..=attempts {
            match self.read_pv().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    log::warn!("read attempt {attempt}/{attempts} failed: {e}");
                    tokio::time::sleep(Duration::from_secs(self.args.retry_delay_secs)).await;
                }
                Err(e) => return Err(format!("failed after {attempts} attempts: {e}")),
            }
        }
        Err("no attempts made".to_string())
    }

    async fn run(&self, report: &mut Report) {
        let name = self.read_text_or_unknown(PropertyId::ObjectName).await;
        let vendor = self.read_text_or_unknown(PropertyId::VendorName).await;
        let model = self.read_text_or_unknown(PropertyId::ModelName).await;
        println!("device {}: name={name} vendor={vendor} model={model}", self.device);
        let identity = match self
            .client
            .read_property(self.device, self.device.object_id(), PropertyId::ObjectIdentifier)
            .await
        {
            Ok(PropertyValue::ObjectId(id)) if id == self.device.object_id() => Ok(id.to_string()),
            Ok(other) => Err(format!("unexpected object identifier {other}")),
            Err(e) => Err(e.to_string()),
        };
        report.check("device identity", identity);

        let original = match self.read_pv_with_retry().await {
            Ok(value) => {
                report.check("read present value", Ok(value.to_string()));
                value
            }
            Err(why) => {
                report.check("read present value", Err(why));
                return;
            }
        };

        report.check(
            "write and read back",
            self.write_and_verify(self.args.test_write_value).await,
        );
        for value in CYCLE_VALUES {
            report.check(&format!("cycle {value}"), self.write_and_verify(value).await);
        }

        match self
            .client
            .read_property(self.device, self.av, PropertyId::Units)
            .await
        {
            Ok(units) => {
                let result = match (self.args.expected_units, units.as_unsigned()) {
                    (Some(expected), Some(actual)) if expected != actual => {
                        Err(format!("expected units {expected}, got {actual}"))
                    }
                    _ => Ok(units.to_string()),
                };
                report.check("units", result);
            }
            Err(e) => log::warn!("units not readable, skipped: {e}"),
        }
        match self
            .client
            .read_property(self.device, self.av, PropertyId::Description)
            .await
        {
            Ok(description) => println!("description: {description}"),
            Err(e) => log::warn!("description not readable, skipped: {e}"),
        }

        let missing = ObjectId::new(ObjectType::AnalogValue, MISSING_INSTANCE);
        let missing_result = match self.client.read_present_value(self.device, missing).await {
            Ok(value) => Err(format!("unexpectedly read {value}")),
            Err(e) => Ok(e.to_string()),
        };
        report.check("missing object is rejected", missing_result);

        // AnalogValue Present_Value is a REAL on the wire.
        match self
            .client
            .write_present_value(self.device, self.av, original as f32)
            .await
        {
            Ok(()) => println!("restored present value to {original}"),
            Err(e) => report.check("restore original value", Err(e.to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let device = match DeviceInstance::new(args.device_id) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("invalid BACNET_DEVICE_ID {}: {e}", args.device_id);
            return ExitCode::FAILURE;
        }
    };

    let client = BacnetClient::new(args.client_config());
    if let Err(e) = client.connect().await {
        eprintln!("connect failed: {e}");
        return ExitCode::FAILURE;
    }
    client.register_device(
        device,
        Address::ip(SocketAddr::new(args.device_ip, args.device_port)),
    );

    let timeout = Duration::from_secs(args.timeout_secs);
    let harness = Harness {
        client,
        device,
        av: ObjectId::new(ObjectType::AnalogValue, args.analog_value_instance),
        args,
    };
    let mut report = Report::default();
    if tokio::time::timeout(timeout, harness.run(&mut report))
        .await
        .is_err()
    {
        report.check("overall", Err(format!("did not finish within {timeout:?}")));
    }
    harness.client.disconnect().await;

    println!("{} passed, {} failed", report.passed, report.failed.len());
    if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
