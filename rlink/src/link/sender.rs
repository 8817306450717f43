//! Send path: window admission, transmission, acknowledgments, and the
//! retransmission timers.

use std::sync::Arc;

use log::{debug, trace};

use crate::buffer::SelectiveAck;
use crate::config::Mode;
use crate::core::frame::Frame;
use crate::error::{Error, Result};

use super::{LinkState, RecvSide, Shared};

/// Admits one frame-sized part into the send window and transmits it.
///
/// Suspends while the window is full; wakes when the receive path retires
/// slots or the endpoint shuts down.
pub(super) async fn send_part(shared: &Arc<Shared>, part: &[u8]) -> Result<()> {
    let bytes = loop {
        let notified = shared.window_open.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        {
            let mut st = shared.lock();
            if st.closed {
                return Err(Error::Shutdown);
            }
            if !st.send.is_full() {
                break admit(shared, &mut st, part);
            }
        }
        tokio::select! {
            _ = shared.cancel.cancelled() => return Err(Error::Shutdown),
            _ = &mut notified => {}
        }
    };
    shared.write_frame(&bytes).await
}

/// Appends a window slot, applies the timer discipline, and encodes the
/// data frame for transmission.
fn admit(shared: &Arc<Shared>, st: &mut LinkState, part: &[u8]) -> Vec<u8> {
    let seq = st.send.push(part.to_vec());
    st.stats.frames_transmitted += 1;
    match shared.config.mode {
        // One timer per endpoint, armed when the window stops being empty.
        Mode::Gbn => {
            if st.send.len() == 1 {
                arm_gbn_timer(shared, st);
            }
        }
        // One logical timer per frame in flight.
        Mode::Sr => arm_sr_timer(shared, seq),
    }
    trace!("tx data seq={seq} len={}", part.len());
    Frame::new(seq, data_ack_field(st), part.to_vec()).encode()
}

/// The `ack` field carried by outgoing data frames: the cumulative position
/// under Go-Back-N, zero (and ignored by the peer) under Selective Repeat.
fn data_ack_field(st: &LinkState) -> u32 {
    match &st.recv {
        RecvSide::Gbn { expected } => *expected,
        RecvSide::Sr { .. } => 0,
    }
}

/// Transmits the zero-length frame produced by an empty chunk.
///
/// The frame consumes no sequence number and no window slot: a windowed
/// empty frame could never be acknowledged under Go-Back-N, which only
/// advances on data. On the wire it is indistinguishable from a blank ack,
/// so its `ack` field must carry something the peer can safely absorb: the
/// current cumulative position (GBN) or a re-ack of the last in-order
/// delivery (SR; wraps to `u32::MAX` before anything arrived, which no
/// in-flight slot can match).
pub(super) async fn send_heartbeat(shared: &Arc<Shared>) -> Result<()> {
    let bytes = {
        let mut st = shared.lock();
        if st.closed {
            return Err(Error::Shutdown);
        }
        st.stats.frames_transmitted += 1;
        let ack = match &st.recv {
            RecvSide::Gbn { expected } => *expected,
            RecvSide::Sr { window } => window.base_seq().wrapping_sub(1),
        };
        Frame::ack_only(st.send.next_seq(), ack).encode()
    };
    shared.write_frame(&bytes).await
}

/// Applies an acknowledgment number to the send window.
///
/// Called from the receive path with the state lock held.
pub(super) fn on_ack(shared: &Arc<Shared>, st: &mut LinkState, ack: u32) {
    match shared.config.mode {
        Mode::Gbn => on_ack_gbn(shared, st, ack),
        Mode::Sr => on_ack_sr(shared, st, ack),
    }
}

/// Cumulative acknowledgment: `ack` is the next sequence the peer expects.
fn on_ack_gbn(shared: &Arc<Shared>, st: &mut LinkState, ack: u32) {
    if st.send.is_empty() {
        return;
    }
    debug_assert!(ack <= st.send.next_seq(), "peer acked beyond next_seq");
    let retired = st.send.ack_cumulative(ack);
    if retired == 0 {
        return;
    }
    trace!("cumulative ack {ack} retired {retired} slots");
    shared.window_open.notify_waiters();
    if st.send.is_empty() {
        // Disarm: the scheduled firing sees a stale generation.
        st.timer_gen = st.timer_gen.wrapping_add(1);
    } else {
        arm_gbn_timer(shared, st);
    }
}

/// Selective acknowledgment of one received sequence number.
fn on_ack_sr(shared: &Arc<Shared>, st: &mut LinkState, ack: u32) {
    match st.send.ack_selective(ack) {
        SelectiveAck::Advanced(retired) => {
            trace!("selective ack {ack} advanced the base, retiring {retired}");
            shared.window_open.notify_waiters();
        }
        SelectiveAck::Marked => trace!("selective ack {ack} marked"),
        SelectiveAck::Ignored => trace!("selective ack {ack} ignored"),
    }
}

/// Arms the single Go-Back-N timer for the current window head.
///
/// Arming bumps the generation, so any previously scheduled firing becomes
/// a no-op when it wakes: at most one timer is ever live.
pub(super) fn arm_gbn_timer(shared: &Arc<Shared>, st: &mut LinkState) {
    st.timer_gen = st.timer_gen.wrapping_add(1);
    let generation = st.timer_gen;
    let Some(head) = st.send.head_seq() else {
        return;
    };
    let weak = Arc::downgrade(shared);
    let cancel = shared.cancel.clone();
    let timer = shared.config.timer;
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(timer) => {}
        }
        if let Some(shared) = weak.upgrade() {
            gbn_timeout(&shared, generation, head).await;
        }
    });
}

/// Go-Back-N timeout: nothing the timer was armed for has been
/// acknowledged, so every frame still in the window goes out again.
async fn gbn_timeout(shared: &Arc<Shared>, generation: u64, fired_for: u32) {
    let frames = {
        let mut st = shared.lock();
        if st.closed || generation != st.timer_gen || st.send.is_empty() {
            return;
        }
        // Any base advance re-arms with a fresh generation, so a live
        // firing always finds the window where it left it.
        debug_assert_eq!(st.send.base_seq(), fired_for);

        let ack = data_ack_field(&st);
        let frames: Vec<Vec<u8>> = st
            .send
            .iter()
            .map(|slot| Frame::new(slot.seq, ack, slot.payload.clone()).encode())
            .collect();
        st.stats.retransmissions += frames.len() as u64;
        st.stats.frames_transmitted += frames.len() as u64;
        debug!(
            "timeout at seq {fired_for}: retransmitting {} frames",
            frames.len()
        );
        arm_gbn_timer(shared, &mut st);
        frames
    };
    for bytes in frames {
        if shared.write_frame(&bytes).await.is_err() {
            return;
        }
    }
}

/// Arms the per-sequence Selective Repeat timer.
pub(super) fn arm_sr_timer(shared: &Arc<Shared>, seq: u32) {
    let weak = Arc::downgrade(shared);
    let cancel = shared.cancel.clone();
    let timer = shared.config.timer;
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(timer) => {}
        }
        if let Some(shared) = weak.upgrade() {
            sr_timeout(&shared, seq).await;
        }
    });
}

/// Selective Repeat timeout: re-sends one frame if it is still unacked,
/// then re-arms its own timer.
async fn sr_timeout(shared: &Arc<Shared>, seq: u32) {
    let bytes = {
        let mut st = shared.lock();
        if st.closed || st.send.base_seq() > seq {
            return;
        }
        let Some(slot) = st.send.get(seq) else {
            return;
        };
        if slot.acked {
            return;
        }
        let bytes = Frame::new(seq, data_ack_field(&st), slot.payload.clone()).encode();
        st.stats.retransmissions += 1;
        st.stats.frames_transmitted += 1;
        debug!("timeout: retransmitting seq {seq}");
        arm_sr_timer(shared, seq);
        bytes
    };
    let _ = shared.write_frame(&bytes).await;
}
