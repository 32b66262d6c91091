use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use server::status::log_status;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = shared::SERVER_PORT)]
    port: u16,

    /// Milliseconds between simulation steps
    #[arg(short, long, default_value_t = shared::TICK_MS)]
    tick_ms: u64,

    /// Longest a single receive may wait, in milliseconds
    #[arg(long, default_value_t = shared::RECV_TIMEOUT_MS)]
    recv_timeout_ms: u64,

    /// Seed for obstacle selection, random if omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds between status lines, 0 disables them
    #[arg(long, default_value = "0")]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_duration: Duration::from_millis(args.tick_ms.max(1)),
        recv_timeout: Duration::from_millis(args.recv_timeout_ms.max(1)),
        seed: args.seed,
    };

    info!("Starting server...");
    info!(
        "Tick every {}ms, receive timeout {}ms",
        config.tick_duration.as_millis(),
        config.recv_timeout.as_millis()
    );

    let mut server = Server::new(config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    if args.status_interval > 0 {
        tokio::spawn(log_status(
            server.status(),
            Duration::from_secs(args.status_interval),
        ));
    }

    server.run().await?;

    Ok(())
}
