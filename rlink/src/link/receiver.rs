//! Receive path: frame decoding, in-order delivery, and acknowledgment
//! policy for both disciplines.

use std::io;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::buffer::RecvOutcome;
use crate::config::Mode;
use crate::core::frame::{Frame, HEADER_SIZE, Header};
use crate::error::{Error, Result};

use super::{LinkState, RecvSide, Shared, sender};

/// Runs the endpoint's receive flow until shutdown or channel failure.
///
/// Owns the channel's read half for the endpoint's whole life.
pub(super) async fn run<R>(shared: Arc<Shared>, mut reader: R)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let frame = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            read = read_frame(&mut reader) => match read {
                Ok(Some(frame)) => frame,
                // Damaged in transit: the bytes are consumed, the frame is
                // forgotten, and retransmission recovers the data.
                Ok(None) => continue,
                Err(err) => {
                    debug!("channel read ended: {err}");
                    break;
                }
            }
        };
        if dispatch(&shared, frame).await.is_err() {
            break;
        }
    }
    shared.close();
}

/// Reads one frame off the ordered byte stream.
///
/// Returns `Ok(None)` when the frame's bytes were consumed but the
/// checksum did not hold.
async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = Header::parse(&header_buf);

    let mut payload = vec![0u8; header.len as usize];
    if header.len > 0 {
        reader.read_exact(&mut payload).await?;
    }

    match header.into_frame(payload) {
        Ok(frame) => Ok(Some(frame)),
        Err(_) => {
            trace!("discarding frame with bad checksum");
            Ok(None)
        }
    }
}

/// Applies one verified frame to the endpoint state, then sends whatever
/// acknowledgment it earned.
async fn dispatch(shared: &Arc<Shared>, frame: Frame) -> Result<()> {
    let reply = {
        let mut st = shared.lock();
        if st.closed {
            return Err(Error::Shutdown);
        }
        match shared.config.mode {
            Mode::Gbn => on_frame_gbn(shared, &mut st, &frame),
            Mode::Sr => on_frame_sr(shared, &mut st, &frame),
        }
    };
    if let Some(bytes) = reply {
        shared.write_frame(&bytes).await?;
    }
    Ok(())
}

/// Go-Back-N: every frame carries the peer's cumulative ack; data is
/// accepted only exactly in order, and every data frame earns a blank ack
/// restating the current position.
fn on_frame_gbn(shared: &Arc<Shared>, st: &mut LinkState, frame: &Frame) -> Option<Vec<u8>> {
    if frame.is_ack() {
        st.stats.acks_received += 1;
    }
    sender::on_ack(shared, st, frame.ack);
    if frame.is_ack() {
        return None;
    }

    let LinkState {
        recv,
        inbox,
        stats,
        send,
        ..
    } = st;
    let RecvSide::Gbn { expected } = recv else {
        unreachable!("endpoint mode does not match its receive state")
    };

    if frame.seq == *expected {
        inbox.extend(frame.payload.iter().copied());
        *expected += 1;
        shared.data_ready.notify_waiters();
        trace!("rx seq={} len={} delivered", frame.seq, frame.payload.len());
    } else if frame.seq < *expected {
        stats.duplicates_received += 1;
        trace!("rx seq={} duplicate (expected {expected})", frame.seq);
    } else {
        trace!("rx seq={} out of order (expected {expected})", frame.seq);
    }

    stats.acks_sent += 1;
    stats.frames_transmitted += 1;
    Some(Frame::ack_only(send.next_seq(), *expected).encode())
}

/// Selective Repeat: acks are meaningful only on blank frames (data frames
/// carry a zeroed ack field); data may arrive in any in-window order and
/// every accepted or re-seen frame earns a blank ack naming its sequence.
fn on_frame_sr(shared: &Arc<Shared>, st: &mut LinkState, frame: &Frame) -> Option<Vec<u8>> {
    if frame.is_ack() {
        st.stats.acks_received += 1;
        sender::on_ack(shared, st, frame.ack);
        return None;
    }

    let LinkState {
        recv,
        inbox,
        stats,
        send,
        ..
    } = st;
    let RecvSide::Sr { window } = recv else {
        unreachable!("endpoint mode does not match its receive state")
    };

    match window.accept(frame.seq, frame.payload.clone()) {
        RecvOutcome::Delivered(parts) => {
            for part in parts {
                inbox.extend(part);
            }
            shared.data_ready.notify_waiters();
            trace!("rx seq={} delivered through {}", frame.seq, window.base_seq());
        }
        RecvOutcome::Parked => {
            trace!("rx seq={} parked (base {})", frame.seq, window.base_seq());
        }
        RecvOutcome::Duplicate | RecvOutcome::Stale => {
            stats.duplicates_received += 1;
            trace!("rx seq={} duplicate", frame.seq);
        }
        RecvOutcome::OutOfRange => {
            // A conforming peer cannot run this far ahead of its acks.
            debug_assert!(false, "peer sent seq {} beyond the receive window", frame.seq);
            warn!("ignoring seq {} beyond the receive window", frame.seq);
            return None;
        }
    }

    stats.acks_sent += 1;
    stats.frames_transmitted += 1;
    Some(Frame::ack_only(send.next_seq(), frame.seq).encode())
}
