use clap::Parser;
use client::network::{Client, ClientOptions};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8999")]
    server: String,

    /// Do not acknowledge finished matches
    #[arg(long)]
    no_reset: bool,

    /// Number of matches to play, 0 plays forever
    #[arg(short = 'm', long, default_value = "0")]
    matches: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting bot client...");
    info!("Connecting to: {}", args.server);
    if args.matches > 0 {
        info!("Playing {} matches", args.matches);
    }

    let mut client = Client::new(ClientOptions {
        server_addr: args.server,
        acknowledge_resets: !args.no_reset,
        max_matches: args.matches,
    })
    .await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
