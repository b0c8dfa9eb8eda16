use clap::Parser;
use client::mirror::parse_assignment;
use client::network;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// User id for saving and restoring option preferences
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Option change to propose once connected, e.g. --set "Player Speed=2"
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    if !args.set.is_empty() {
        info!("{} option changes queued", args.set.len());
    }

    let mut client =
        network::Client::new(&args.server, args.user, args.set, args.fake_ping).await?;

    client.run().await?;

    Ok(())
}
