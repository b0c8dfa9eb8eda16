use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use server::profile::{FileProfileStore, MemoryProfileStore, ProfileStore};
use server::room::{Room, RoomConfig};
use shared::{MAX_TRANSITION_ITERATIONS, OPTION_CHUNK_SIZE};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "15")]
    max_clients: usize,

    /// Seconds between full option resyncs, 0 to disable
    #[arg(long, default_value = "0")]
    resync_secs: u64,

    /// Maximum option operations per packet
    #[arg(long, default_value_t = OPTION_CHUNK_SIZE)]
    chunk_size: usize,

    /// Schema rebuild passes before a transition is abandoned
    #[arg(long, default_value_t = MAX_TRANSITION_ITERATIONS)]
    max_transitions: u32,

    /// Directory for saved option preferences (kept in memory when omitted)
    #[arg(long)]
    profile_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let profiles: Box<dyn ProfileStore> = match &args.profile_dir {
        Some(dir) => {
            info!("Saving option preferences to {}", dir.display());
            Box::new(FileProfileStore::new(dir.clone())?)
        }
        None => Box::new(MemoryProfileStore::new()),
    };

    let room_config = RoomConfig {
        chunk_size: args.chunk_size.max(1),
        max_transition_iterations: args.max_transitions.max(1),
    };
    let room = Room::with_builtin_gamemodes(room_config, profiles);
    info!("Game modes: {}", room.gamemode_names().join(", "));

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        resync_interval: Some(Duration::from_secs(args.resync_secs)),
    };

    let mut server = Server::new(config, room).await?;
    let control = server.control_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            let _ = control.send(server::network::ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
