use bacwire_client::BacnetClient;
use bacwire_core::types::{DeviceInstance, ObjectId, PropertyId};
use bacwire_tools::{locate_device, parse_property, ConnectionArgs, ObjectTypeArg, ValueKind};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bacnet-writeprop")]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,
    #[arg(long)]
    device: u32,
    #[arg(long)]
    ip: Option<IpAddr>,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    #[arg(long, value_enum, default_value = "analog-value")]
    object_type: ObjectTypeArg,
    #[arg(long)]
    instance: u32,
    #[arg(long, value_parser = parse_property, default_value = "present-value")]
    property: PropertyId,
    #[arg(long, value_enum, default_value = "real")]
    kind: ValueKind,
    /// Value to write; omit with `--kind null` to relinquish.
    #[arg(long)]
    value: Option<String>,
    /// Command priority 1-16.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    priority: Option<u8>,
    #[arg(long, default_value_t = 3)]
    discover_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let value = args.kind.parse(args.value.as_deref())?;
    let device = DeviceInstance::new(args.device)?;
    let object_id = ObjectId::try_new(args.object_type.into_object_type(), args.instance)?;

    let client = BacnetClient::new(args.conn.client_config());
    client.connect().await?;
    let at = args.ip.map(|ip| SocketAddr::new(ip, args.port));
    let found = locate_device(&client, device, at, Duration::from_secs(args.discover_secs)).await?;
    let result = client
        .write_property_at(&found.address, object_id, args.property, None, value, args.priority)
        .await;
    client.disconnect().await;

    if let Err(e) = result {
        eprintln!("write failed: {e}");
        std::process::exit(1);
    }
    println!("write acknowledged");
    Ok(())
}
