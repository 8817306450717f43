//! Two endpoints talking across an in-memory lossy channel.
//!
//! Run with: cargo run --example loopback

use rlink::phys::loopback;
use rlink::{Config, Endpoint, Impairment, LossySink, Mode, Role};

#[tokio::main]
async fn main() -> rlink::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::new(Mode::Sr);
    let impairment = Impairment::new(0.2, 0.05);

    let (a, b) = loopback(64 * 1024);
    let (read_a, write_a) = tokio::io::split(a);
    let (read_b, write_b) = tokio::io::split(b);
    let mut left = Endpoint::new(read_a, LossySink::new(write_a, impairment), config);
    let mut right = Endpoint::new(read_b, LossySink::new(write_b, impairment), config);

    let message = b"Every frame of this message may be dropped or damaged in transit; \
                    the sliding window gets it across anyway.";
    for chunk in message.chunks(16) {
        left.send(chunk).await?;
    }

    let delivered = right.recv(message.len()).await?;
    println!("delivered: {}", String::from_utf8_lossy(&delivered));
    println!(
        "left : {}",
        left.stats()
            .log_line(config.mode, impairment.drop_rate, impairment.corrupt_rate, Role::Client)
    );
    println!(
        "right: {}",
        right
            .stats()
            .log_line(config.mode, impairment.drop_rate, impairment.corrupt_rate, Role::Server)
    );

    left.shutdown().await;
    right.shutdown().await;
    Ok(())
}
