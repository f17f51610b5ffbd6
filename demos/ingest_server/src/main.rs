//! Accepts RTMP publishers and, optionally, records the first published stream to a file as
//! FLV, MPEG-TS or fragmented MP4.

mod connection;
mod output;

use crate::connection::Connection;
use crate::output::{MediaOutput, OutputFormat};
use clap::Parser;
use ingest_rtmp::sessions::ServerSessionConfig;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "ingest-server")]
#[command(about = "Accepts RTMP publishers and optionally records one stream")]
struct Args {
    /// TCP port to listen on
    #[arg(long, default_value_t = 1935)]
    port: u16,

    /// Only accept publishers connecting to this application
    #[arg(long)]
    app: Option<String>,

    /// Only accept publishers using this stream key
    #[arg(long)]
    stream_key: Option<String>,

    /// File the first publishing connection's media is written to
    #[arg(long)]
    output: Option<PathBuf>,

    /// Container used for the output file
    #[arg(long, value_enum, default_value_t = OutputFormat::Flv)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerSessionConfig::new();
    if let Some(app) = &args.app {
        config = config.with_required_app(app.as_str());
    }

    if let Some(stream_key) = &args.stream_key {
        config = config.with_required_stream_key(stream_key.as_str());
    }

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, "Listening for connections");

    let output_claimed = Arc::new(AtomicBool::new(false));
    let mut current_id = 0_u32;
    loop {
        let (stream, address) = listener.accept().await?;
        info!(connection_id = current_id, %address, "Connection received");

        // Only a single connection is recorded
        let mut output = None;
        if let Some(path) = &args.output {
            if !output_claimed.swap(true, Ordering::SeqCst) {
                output = Some(MediaOutput::create(path, args.format).await?);
                info!(
                    connection_id = current_id,
                    path = %path.display(),
                    format = ?args.format,
                    "Recording connection"
                );
            }
        }

        let session_config = config.clone().with_flv_output(output.is_some());
        let connection = Connection::new(current_id, session_config, output);
        spawn(connection.run(stream));
        current_id = current_id.wrapping_add(1);
    }
}

fn spawn<F, E>(future: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display,
{
    tokio::task::spawn(async {
        if let Err(error) = future.await {
            error!(%error, "Connection task failed");
        }
    });
}
