use bacwire_client::BacnetClient;
use bacwire_core::types::{DeviceInstance, ObjectId, PropertyId};
use bacwire_tools::{locate_device, parse_property, ConnectionArgs, ObjectTypeArg};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bacnet-readprop")]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,
    /// Device instance to read from.
    #[arg(long)]
    device: u32,
    /// Device IP; discovered with Who-Is when omitted.
    #[arg(long)]
    ip: Option<IpAddr>,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    #[arg(long, value_enum, default_value = "device")]
    object_type: ObjectTypeArg,
    /// Object instance; defaults to the device instance.
    #[arg(long)]
    instance: Option<u32>,
    /// Property name (e.g. present-value) or number.
    #[arg(long, value_parser = parse_property, default_value = "object-name")]
    property: PropertyId,
    #[arg(long)]
    index: Option<u32>,
    #[arg(long, default_value_t = 3)]
    discover_secs: u64,
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let device = DeviceInstance::new(args.device)?;
    let client = BacnetClient::new(args.conn.client_config());
    client.connect().await?;

    let at = args.ip.map(|ip| SocketAddr::new(ip, args.port));
    let found = locate_device(&client, device, at, Duration::from_secs(args.discover_secs)).await?;
    let object_id = ObjectId::try_new(
        args.object_type.into_object_type(),
        args.instance.unwrap_or(args.device),
    )?;
    let result = client
        .read_property_at(&found.address, object_id, args.property, args.index)
        .await;
    client.disconnect().await;

    match result {
        Ok(v) if args.json => println!("{}", serde_json::to_string_pretty(&v)?),
        Ok(v) => println!("{object_id} {:?}: {v}", args.property),
        Err(e) => {
            eprintln!("read failed: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
