use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use talava_reps::config::{Config, ExerciseKind};
use talava_reps::protocol::message_stream;
use talava_reps::server::serve_connection;
use talava_reps::GIT_VERSION;

/// Serve rep counting over TCP, one session per connection.
#[derive(Parser, Debug)]
#[command(name = "rep_server", version)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `server.addr`
    #[arg(short, long)]
    listen: Option<String>,

    /// Exercise for new connections
    #[arg(short, long)]
    exercise: Option<ExerciseKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config);
    if let Some(addr) = args.listen {
        config.server.addr = addr;
    }
    if let Some(kind) = args.exercise {
        config.app.exercise = kind;
    }
    log::info!("Rep Server ({})", GIT_VERSION);
    log::info!("Exercise: {}", config.app.exercise);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    log::info!("Listening on {}", config.server.addr);
    let config = Arc::new(config);

    loop {
        let (tcp_stream, addr) = listener.accept().await?;
        tcp_stream.set_nodelay(true)?;
        log::info!("Client connected: {}", addr);

        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(message_stream(tcp_stream), config).await {
                log::error!("{}: {:#}", addr, e);
            }
            log::info!("Client disconnected: {}", addr);
        });
    }
}
