//! Radio relay command line
//!
//! ```sh
//! # Serve stations listed in a directory file
//! radio-relay serve --port 8080 --grace 10 --directory stations.json
//!
//! # Listen to a station through a running relay
//! radio-relay listen --server-url http://127.0.0.1:8080 QRR \
//!     | aplay -f S16_LE -r 48000 -c 2
//! ```
//!
//! Logs go to stderr so `listen` can write audio to stdout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use radio_relay::client::{Player, PlayerConfig, PlayerEvent, RemotePlayer, StdoutOutput};
use radio_relay::server::config::DEFAULT_PORT;
use radio_relay::upstream::StaticDirectory;
use radio_relay::{RegistryConfig, RelayServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "radio-relay", about = "Shared-stream radio relay", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Seconds an idle stream is kept alive (zero or negative uses 10)
        #[arg(long, env = "GRACE_PERIOD", default_value_t = 10, allow_negative_numbers = true)]
        grace: i64,

        /// JSON file mapping stations to areas and stream endpoints
        #[arg(long, env = "RADIO_DIRECTORY")]
        directory: PathBuf,

        /// Transcoder executable
        #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
        ffmpeg: String,
    },

    /// Play a station from a relay, writing s16le stereo 48 kHz PCM to stdout
    Listen {
        /// Relay base URL
        #[arg(long, env = "RADIO_SERVER_URL", default_value = "http://127.0.0.1:8080")]
        server_url: String,

        /// Volume, 0 to 100
        #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: u8,

        /// Station id, e.g. QRR
        station: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("radio_relay=info")),
        )
        .init();

    match Args::parse().command {
        Command::Serve {
            port,
            grace,
            directory,
            ffmpeg,
        } => serve(port, grace, directory, ffmpeg).await?,
        Command::Listen {
            server_url,
            volume,
            station,
        } => listen(server_url, volume, station).await?,
    }

    Ok(())
}

async fn serve(port: u16, grace: i64, directory: PathBuf, ffmpeg: String) -> radio_relay::Result<()> {
    let directory = StaticDirectory::load(&directory).await?;
    if directory.is_empty() {
        tracing::warn!("Station directory is empty");
    }

    let registry = RegistryConfig::default()
        .grace_period_secs(grace)
        .transcoder_binary(ffmpeg);
    let config = ServerConfig::with_addr(SocketAddr::from(([0, 0, 0, 0], port))).registry(registry);

    tracing::info!(
        port = port,
        grace_secs = config.registry.grace_period.as_secs(),
        stations = directory.len(),
        "Starting relay"
    );

    let server = RelayServer::new(config, Arc::new(directory));
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn listen(server_url: String, volume: u8, station: String) -> radio_relay::Result<()> {
    let config = PlayerConfig::new(server_url).initial_volume(f64::from(volume) / 100.0);
    let (player, mut events) = RemotePlayer::new(config, Arc::new(StdoutOutput::new()));

    player.play(&station).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Some(PlayerEvent::ReconnectFailed { error, .. }) => {
                    tracing::error!(error = %error, "Giving up");
                    break;
                }
                Some(PlayerEvent::Stopped) | None => break,
                Some(event) => tracing::debug!(?event, "Player event"),
            }
        }
    }

    player.stop().await;
    Ok(())
}
