mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rlink::{Config, Mode};

/// Interactive ASCII-video viewer speaking the reliable link protocol.
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Server address to dial.
    #[arg(long, default_value = "127.0.0.1:8765")]
    connect: SocketAddr,

    /// Sliding-window discipline; must match the server.
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

    /// File the session's statistics line is appended to.
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
    session::run(&args).await
}
