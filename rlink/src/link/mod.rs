//! Link endpoints: reliable ordered byte streams over a lossy channel.
//!
//! An [`Endpoint`] owns one side of the link. Three flows cooperate over
//! its shared state:
//!
//! - consumer calls to [`Endpoint::send`], which admit chunks into the send
//!   window and transmit data frames;
//! - a background receive task that decodes incoming frames, delivers data
//!   in order, acknowledges it, and retires acknowledged send slots;
//! - retransmission timer tasks that re-send what the peer has not
//!   acknowledged in time.
//!
//! Every mutation of window, buffer, or counter state happens under one
//! mutex; channel I/O happens outside it. Timer tasks hold only a weak
//! handle and re-check their guards under the lock when they fire, so a
//! firing that raced an acknowledgment is a no-op.

mod receiver;
mod sender;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::info;
use tokio::io::AsyncRead;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::{RecvWindow, SendWindow};
use crate::config::{Config, Mode};
use crate::core::frame::MAX_PAYLOAD;
use crate::error::{Error, Result};
use crate::phys::FrameSink;
use crate::stats::LinkStats;

/// Receiver-side state, which differs between the two disciplines.
enum RecvSide {
    /// Go-Back-N tracks only the next expected sequence number.
    Gbn { expected: u32 },

    /// Selective Repeat parks out-of-order chunks in a reorder window.
    Sr { window: RecvWindow },
}

/// Endpoint state guarded by [`Shared::state`].
struct LinkState {
    /// Chunks in flight, awaiting acknowledgment.
    send: SendWindow,

    /// Variant-specific receive bookkeeping.
    recv: RecvSide,

    /// Correctly ordered bytes the consumer has not collected yet.
    inbox: VecDeque<u8>,

    /// Counters, updated under the same lock as the state they describe.
    stats: LinkStats,

    /// Generation of the Go-Back-N timer. A scheduled firing whose
    /// generation no longer matches has been superseded and must not act.
    timer_gen: u64,

    /// Set once at shutdown; every blocking call observes it.
    closed: bool,
}

struct Shared {
    config: Config,
    state: Mutex<LinkState>,
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
    /// Signalled when send-window slots free up.
    window_open: Notify,
    /// Signalled when ordered bytes reach the inbox.
    data_ready: Notify,
    cancel: CancellationToken,
    started: Instant,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Marks the endpoint closed and wakes every waiter.
    fn close(&self) {
        {
            let mut st = self.lock();
            st.closed = true;
            st.timer_gen = st.timer_gen.wrapping_add(1);
        }
        self.cancel.cancel();
        self.window_open.notify_waiters();
        self.data_ready.notify_waiters();
    }

    /// Hands one encoded frame to the channel, closing the link on failure.
    async fn write_frame(&self, bytes: &[u8]) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match sink.send_frame(bytes).await {
            Ok(()) => Ok(()),
            Err(err) => {
                drop(sink);
                self.close();
                Err(Error::Io(err))
            }
        }
    }
}

/// One side of the link.
///
/// Both ends are structurally identical; "client" and "server" only matter
/// to the statistics log and to whoever dials the connection.
pub struct Endpoint {
    shared: Arc<Shared>,
    recv_task: Option<JoinHandle<()>>,
}

impl Endpoint {
    /// Builds an endpoint over the channel's read and write halves and
    /// starts its receive task.
    pub fn new<R>(reader: R, sink: impl FrameSink + 'static, config: Config) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let recv = match config.mode {
            Mode::Gbn => RecvSide::Gbn { expected: 0 },
            Mode::Sr => RecvSide::Sr {
                window: RecvWindow::new(config.window_len),
            },
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(LinkState {
                send: SendWindow::new(config.window_len),
                recv,
                inbox: VecDeque::new(),
                stats: LinkStats::default(),
                timer_gen: 0,
                closed: false,
            }),
            sink: tokio::sync::Mutex::new(Box::new(sink)),
            window_open: Notify::new(),
            data_ready: Notify::new(),
            cancel: CancellationToken::new(),
            started: Instant::now(),
            config,
        });
        info!(
            "{} endpoint up: window {}, timer {:?}",
            config.mode, config.window_len, config.timer
        );

        let recv_task = tokio::spawn(receiver::run(Arc::clone(&shared), reader));
        Self {
            shared,
            recv_task: Some(recv_task),
        }
    }

    /// Enqueues a chunk for reliable transmission.
    ///
    /// Blocks while the send window is full. A chunk longer than one
    /// frame's payload occupies consecutive window slots; an empty chunk
    /// transmits a single unsequenced control frame that the peer reads as
    /// an acknowledgment.
    pub async fn send(&self, chunk: &[u8]) -> Result<()> {
        if chunk.len() > self.shared.config.max_chunk {
            return Err(Error::ChunkTooLarge(chunk.len()));
        }
        if chunk.is_empty() {
            return sender::send_heartbeat(&self.shared).await;
        }
        for part in chunk.chunks(MAX_PAYLOAD) {
            sender::send_part(&self.shared, part).await?;
        }
        Ok(())
    }

    /// Returns exactly `n` correctly ordered bytes from the peer, blocking
    /// until they have all arrived.
    pub async fn recv(&self, n: usize) -> Result<Vec<u8>> {
        loop {
            let notified = self.shared.data_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.shared.lock();
                if st.inbox.len() >= n {
                    return Ok(st.inbox.drain(..n).collect());
                }
                if st.closed {
                    return Err(Error::Shutdown);
                }
            }
            tokio::select! {
                _ = self.shared.cancel.cancelled() => return Err(Error::Shutdown),
                _ = &mut notified => {}
            }
        }
    }

    /// Snapshot of the endpoint's counters.
    pub fn stats(&self) -> LinkStats {
        self.shared.lock().stats
    }

    /// Records the one-shot recognition time, measured from endpoint
    /// construction. Later calls are ignored.
    pub fn mark_recognized(&self) {
        let mut st = self.shared.lock();
        if st.stats.time_to_recognize == 0.0 {
            st.stats.time_to_recognize = self.shared.started.elapsed().as_secs_f64();
        }
    }

    /// The configured window discipline.
    pub fn mode(&self) -> Mode {
        self.shared.config.mode
    }

    /// Stops the endpoint: cancels timers and the receive task and releases
    /// every blocked [`send`](Self::send) or [`recv`](Self::recv) with
    /// [`Error::Shutdown`].
    pub async fn shutdown(&mut self) {
        self.shared.close();
        if let Some(task) = self.recv_task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shared.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phys::{Impairment, LossySink, loopback};

    fn pair(config: Config) -> (Endpoint, Endpoint) {
        let (a, b) = loopback(64 * 1024);
        let (read_a, write_a) = tokio::io::split(a);
        let (read_b, write_b) = tokio::io::split(b);
        (
            Endpoint::new(read_a, LossySink::new(write_a, Impairment::none()), config),
            Endpoint::new(read_b, LossySink::new(write_b, Impairment::none()), config),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_chunk_is_rejected() {
        let (left, _right) = pair(Config::new(Mode::Gbn));
        let chunk = vec![0u8; 257];
        assert!(matches!(
            left.send(&chunk).await,
            Err(Error::ChunkTooLarge(257))
        ));
        assert_eq!(left.stats().frames_transmitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chunk_reads_as_ack() {
        let (left, right) = pair(Config::new(Mode::Gbn));

        left.send(&[]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let left_stats = left.stats();
        assert_eq!(left_stats.frames_transmitted, 1);

        let right_stats = right.stats();
        assert_eq!(right_stats.acks_received, 1);
        assert_eq!(right_stats.duplicates_received, 0);
        assert!(right.shared.lock().inbox.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_shutdown_rejects_further_calls() {
        let (mut left, _right) = pair(Config::new(Mode::Sr));

        left.shutdown().await;
        assert!(matches!(left.send(b"x").await, Err(Error::Shutdown)));
        assert!(matches!(left.recv(1).await, Err(Error::Shutdown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_disconnect_releases_blocked_recv() {
        let (left, right) = pair(Config::new(Mode::Gbn));
        let left = Arc::new(left);

        let waiter = tokio::spawn({
            let left = Arc::clone(&left);
            async move { left.recv(1).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        drop(right);

        assert!(matches!(waiter.await.unwrap(), Err(Error::Shutdown)));
        assert!(matches!(left.send(b"x").await, Err(Error::Shutdown)));
    }
}
