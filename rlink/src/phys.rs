//! Physical-layer emulation: a lossy, corrupting wrapper over a byte channel.
//!
//! The link writes whole frames; this layer decides, per frame, whether the
//! frame is silently discarded or has one byte rewritten before it reaches
//! the wire. Whatever survives is delivered in order — reads pass through
//! untouched, so the read side of the channel is plain [`tokio::io::AsyncRead`].

use std::io;

use async_trait::async_trait;
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};

/// Drop and corruption probabilities for outgoing frames, as plain
/// probabilities in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Impairment {
    /// Probability that an outgoing frame is silently discarded.
    pub drop_rate: f64,

    /// Probability that one byte of an outgoing frame is rewritten. The
    /// rewritten byte always differs from the original.
    pub corrupt_rate: f64,
}

impl Impairment {
    /// A channel that delivers every frame untouched.
    pub const fn none() -> Self {
        Self {
            drop_rate: 0.0,
            corrupt_rate: 0.0,
        }
    }

    /// Creates an impairment profile. Panics when a rate falls outside
    /// `[0, 1]`; validate user input before it gets here.
    pub fn new(drop_rate: f64, corrupt_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&drop_rate),
            "drop rate must be within [0, 1]"
        );
        assert!(
            (0.0..=1.0).contains(&corrupt_rate),
            "corrupt rate must be within [0, 1]"
        );
        Self {
            drop_rate,
            corrupt_rate,
        }
    }
}

/// Write half of the channel, at frame granularity.
///
/// One call transfers one whole frame: implementations must never
/// interleave bytes of two frames on the wire.
#[async_trait]
pub trait FrameSink: Send {
    /// Hands one encoded frame to the channel.
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Lossy write half: applies an [`Impairment`] to each outgoing frame
/// before it reaches the wrapped writer.
pub struct LossySink<W> {
    inner: W,
    impairment: Impairment,
    rng: StdRng,
}

impl<W> LossySink<W> {
    /// Wraps a writer with entropy-seeded impairment decisions.
    pub fn new(inner: W, impairment: Impairment) -> Self {
        Self {
            inner,
            impairment,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Wraps a writer with a fixed seed, for reproducible loss patterns.
    pub fn with_seed(inner: W, impairment: Impairment, seed: u64) -> Self {
        Self {
            inner,
            impairment,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for LossySink<W> {
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.impairment.drop_rate > 0.0 && self.rng.random::<f64>() < self.impairment.drop_rate {
            trace!("dropping {}-byte frame", frame.len());
            return Ok(());
        }

        if self.impairment.corrupt_rate > 0.0
            && self.rng.random::<f64>() < self.impairment.corrupt_rate
        {
            let mut damaged = frame.to_vec();
            let index = self.rng.random_range(0..damaged.len());
            damaged[index] ^= self.rng.random_range(1..=255u8);
            trace!("corrupting byte {index} of a {}-byte frame", damaged.len());
            self.inner.write_all(&damaged).await?;
        } else {
            self.inner.write_all(frame).await?;
        }
        self.inner.flush().await
    }
}

/// An in-memory duplex channel for tests and examples: each returned half
/// reads what the other writes.
pub fn loopback(capacity: usize) -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(capacity)
}
