mod catalog;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use rlink::{Config, Mode};
use tokio::net::TcpListener;

/// ASCII-video catalog server speaking the reliable link protocol.
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8765")]
    listen: SocketAddr,

    /// Sliding-window discipline; must match the client.
    #[arg(long, default_value = "gbn")]
    mode: Mode,

    /// Probability in [0, 1] of dropping each outgoing frame.
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
    drop: f64,

    /// Probability in [0, 1] of corrupting one byte of each outgoing frame.
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
    corrupt: f64,

    /// Override the mode's default window length.
    #[arg(long)]
    window: Option<usize>,

    /// Override the mode's default retransmission timer, in milliseconds.
    #[arg(long)]
    timer_ms: Option<u64>,

    /// Directory of ASCII videos to serve.
    #[arg(long, default_value = "videos")]
    videos: PathBuf,

    /// File each session's statistics line is appended to.
    #[arg(long, default_value = "linkstats.log")]
    log: PathBuf,
}

fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|err| format!("{err}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("rate {rate} is outside [0, 1]"))
    }
}

fn link_config(args: &Args) -> Config {
    let mut config = Config::new(args.mode);
    if let Some(window) = args.window {
        config = config.with_window_len(window);
    }
    if let Some(ms) = args.timer_ms {
        config = config.with_timer(Duration::from_millis(ms));
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let listener = TcpListener::bind(args.listen).await?;
    info!("listening on {} in {} mode", args.listen, args.mode);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("accepted connection from {peer}");
        let args = args.clone();
        tokio::spawn(async move {
            if let Err(err) = catalog::serve(stream, &args).await {
                error!("session with {peer} failed: {err:#}");
            }
        });
    }
}
