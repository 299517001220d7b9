use bacwire_client::SimulatedDevice;
use bacwire_core::types::DeviceInstance;
use bacwire_datalink::BacnetIpTransport;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "bacnet-simulator")]
struct Args {
    /// Device instance number.
    #[arg(long, default_value_t = 9999)]
    instance: u32,
    /// Number of analog-value objects to create.
    #[arg(long, default_value_t = 3)]
    analog_values: u32,
    #[arg(long, env = "BACNET_BIND", default_value = "0.0.0.0:47808")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let transport = Arc::new(BacnetIpTransport::bind(args.bind).await?);
    let local = transport.local_addr()?;
    let sim = SimulatedDevice::new(DeviceInstance::new(args.instance)?, transport);

    for i in 1..=args.analog_values {
        sim.add_analog_value(i, &format!("AV-{i}"), 0.0).await;
    }

    println!(
        "Simulated device {} on {local} ({} AV). Ctrl+C to stop.",
        args.instance, args.analog_values
    );
    sim.run().await?;
    Ok(())
}
