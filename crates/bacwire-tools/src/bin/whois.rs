use bacwire_client::BacnetClient;
use bacwire_tools::ConnectionArgs;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bacnet-whois")]
struct Args {
    #[command(flatten)]
    conn: ConnectionArgs,
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,
    /// Lowest device instance to ask for (requires --high).
    #[arg(long, requires = "high")]
    low: Option<u32>,
    #[arg(long, requires = "low")]
    high: Option<u32>,
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let client = BacnetClient::new(args.conn.client_config());
    client.connect().await?;

    let timeout = Duration::from_secs(args.timeout_secs);
    let devices = match (args.low, args.high) {
        (Some(low), Some(high)) => client.whois_range(low, high, timeout).await?,
        _ => client.whois(timeout).await?,
    };
    client.disconnect().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        for d in &devices {
            let vendor = d.vendor_id.map_or_else(|| "?".to_string(), |v| v.to_string());
            println!("{:>8}  {}  vendor={vendor}", d.instance, d.address);
        }
        println!("{} device(s) found", devices.len());
    }
    Ok(())
}
