//! Sliding-window state for both ends of the link.
//!
//! [`SendWindow`] holds chunks that have been transmitted but not yet
//! acknowledged and supports both acknowledgment styles: cumulative
//! trimming for Go-Back-N and selective mark-and-pop for Selective Repeat.
//! [`RecvWindow`] is the Selective Repeat reorder buffer; Go-Back-N needs
//! only a bare expected-sequence cursor and no structure here.

use std::collections::VecDeque;

/// A sent-but-unacknowledged chunk held in the send window.
#[derive(Debug, Clone)]
pub struct SendSlot {
    /// Sequence number assigned at admission.
    pub seq: u32,

    /// The chunk's bytes, kept for retransmission.
    pub payload: Vec<u8>,

    /// Whether a selective ack has named this slot. Unused under
    /// Go-Back-N, where only the contiguous prefix ever retires.
    pub acked: bool,
}

/// Outcome of applying a selective acknowledgment to the send window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectiveAck {
    /// The ack named the window base; this many slots retired.
    Advanced(usize),

    /// The ack named a later in-flight slot, now marked.
    Marked,

    /// The ack named nothing in flight (stale or unknown).
    Ignored,
}

/// Send window: at most `limit` slots with consecutive ascending sequence
/// numbers starting at the base.
#[derive(Debug)]
pub struct SendWindow {
    slots: VecDeque<SendSlot>,
    next_seq: u32,
    limit: usize,
}

impl SendWindow {
    /// Creates an empty window bounded at `limit` slots.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "window limit must be positive");
        Self {
            slots: VecDeque::with_capacity(limit),
            next_seq: 0,
            limit,
        }
    }

    /// Number of slots in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when nothing is awaiting acknowledgment.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true when no further chunk can be admitted.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.limit
    }

    /// Sequence number the next admitted chunk will get.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Lowest sequence number still in flight; equals [`next_seq`](Self::next_seq)
    /// when the window is empty.
    pub fn base_seq(&self) -> u32 {
        self.next_seq - self.slots.len() as u32
    }

    /// Sequence number of the oldest in-flight slot, if any.
    pub fn head_seq(&self) -> Option<u32> {
        self.slots.front().map(|slot| slot.seq)
    }

    /// Admits a chunk, assigning it the next sequence number.
    ///
    /// The caller must have checked [`is_full`](Self::is_full).
    pub fn push(&mut self, payload: Vec<u8>) -> u32 {
        debug_assert!(!self.is_full());
        let seq = self.next_seq;
        self.slots.push_back(SendSlot {
            seq,
            payload,
            acked: false,
        });
        self.next_seq += 1;
        seq
    }

    /// Cumulative acknowledgment: retires every slot with `seq < ack`
    /// ("the peer expects `ack` next"). Returns the number retired.
    pub fn ack_cumulative(&mut self, ack: u32) -> usize {
        let mut retired = 0;
        while self.slots.front().is_some_and(|slot| slot.seq < ack) {
            self.slots.pop_front();
            retired += 1;
        }
        retired
    }

    /// Selective acknowledgment of one specific sequence number.
    ///
    /// An ack for the base retires it together with any already-marked
    /// slots behind it; an ack for a later slot only marks it.
    pub fn ack_selective(&mut self, ack: u32) -> SelectiveAck {
        if self.slots.is_empty() || ack < self.base_seq() {
            return SelectiveAck::Ignored;
        }
        if ack == self.base_seq() {
            self.slots.pop_front();
            let mut retired = 1;
            while self.slots.front().is_some_and(|slot| slot.acked) {
                self.slots.pop_front();
                retired += 1;
            }
            return SelectiveAck::Advanced(retired);
        }
        match self.slots.iter_mut().find(|slot| slot.seq == ack) {
            Some(slot) => {
                slot.acked = true;
                SelectiveAck::Marked
            }
            None => SelectiveAck::Ignored,
        }
    }

    /// Looks up an in-flight slot by sequence number.
    pub fn get(&self, seq: u32) -> Option<&SendSlot> {
        self.slots.iter().find(|slot| slot.seq == seq)
    }

    /// Iterates the in-flight slots in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &SendSlot> {
        self.slots.iter()
    }
}

/// An out-of-order chunk parked in the receive window.
#[derive(Debug, Clone)]
pub struct RecvSlot {
    /// Sequence number from the frame.
    pub seq: u32,

    /// The frame's payload, waiting for the gap before it to fill.
    pub payload: Vec<u8>,
}

/// What the receive window did with an incoming data frame.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome {
    /// The frame was in order; these payloads are now deliverable, in
    /// sequence order (the frame itself plus any parked successors).
    Delivered(Vec<Vec<u8>>),

    /// The frame is ahead of the base and has been parked.
    Parked,

    /// The frame is already parked in the window.
    Duplicate,

    /// The frame precedes the base; its data was delivered earlier.
    Stale,

    /// The frame lies at or beyond `base + limit`, which a conforming
    /// peer cannot produce.
    OutOfRange,
}

/// Selective Repeat reorder buffer: parks in-window frames that arrive
/// ahead of the base and releases contiguous runs as the gaps fill.
#[derive(Debug)]
pub struct RecvWindow {
    slots: VecDeque<RecvSlot>,
    base: u32,
    limit: usize,
}

impl RecvWindow {
    /// Creates an empty reorder window accepting `limit` sequence numbers
    /// from the base.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "window limit must be positive");
        Self {
            slots: VecDeque::new(),
            base: 0,
            limit,
        }
    }

    /// Next sequence number still owed to the consumer.
    pub fn base_seq(&self) -> u32 {
        self.base
    }

    /// Number of frames parked ahead of the base.
    pub fn parked(&self) -> usize {
        self.slots.len()
    }

    /// Classifies and stores one data frame.
    pub fn accept(&mut self, seq: u32, payload: Vec<u8>) -> RecvOutcome {
        if seq < self.base {
            return RecvOutcome::Stale;
        }
        if seq >= self.base + self.limit as u32 {
            return RecvOutcome::OutOfRange;
        }
        if seq == self.base {
            let mut deliverable = vec![payload];
            self.base += 1;
            while self.slots.front().is_some_and(|slot| slot.seq == self.base) {
                if let Some(slot) = self.slots.pop_front() {
                    deliverable.push(slot.payload);
                    self.base += 1;
                }
            }
            return RecvOutcome::Delivered(deliverable);
        }
        match self.slots.binary_search_by_key(&seq, |slot| slot.seq) {
            Ok(_) => RecvOutcome::Duplicate,
            Err(index) => {
                self.slots.insert(index, RecvSlot { seq, payload });
                RecvOutcome::Parked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_window_consecutive_seqs() {
        let mut window = SendWindow::new(3);
        assert_eq!(window.push(b"a".to_vec()), 0);
        assert_eq!(window.push(b"b".to_vec()), 1);
        assert_eq!(window.push(b"c".to_vec()), 2);
        assert!(window.is_full());
        assert_eq!(window.base_seq(), 0);
        assert_eq!(window.next_seq(), 3);
    }

    #[test]
    fn test_cumulative_ack_trims_prefix() {
        let mut window = SendWindow::new(5);
        for _ in 0..4 {
            window.push(vec![0]);
        }

        // "I expect 2 next" retires 0 and 1.
        assert_eq!(window.ack_cumulative(2), 2);
        assert_eq!(window.base_seq(), 2);
        assert_eq!(window.len(), 2);

        // A stale repeat retires nothing.
        assert_eq!(window.ack_cumulative(2), 0);

        assert_eq!(window.ack_cumulative(4), 2);
        assert!(window.is_empty());
        assert_eq!(window.base_seq(), 4);
    }

    #[test]
    fn test_selective_ack_of_base_pops_marked_run() {
        let mut window = SendWindow::new(5);
        for _ in 0..4 {
            window.push(vec![0]);
        }

        assert_eq!(window.ack_selective(2), SelectiveAck::Marked);
        assert_eq!(window.ack_selective(1), SelectiveAck::Marked);
        assert_eq!(window.len(), 4);

        // Acking the base releases it plus the marked run behind it.
        assert_eq!(window.ack_selective(0), SelectiveAck::Advanced(3));
        assert_eq!(window.base_seq(), 3);
        assert_eq!(window.len(), 1);

        // Stale and unknown acks are ignored.
        assert_eq!(window.ack_selective(0), SelectiveAck::Ignored);
        assert_eq!(window.ack_selective(9), SelectiveAck::Ignored);
    }

    #[test]
    fn test_selective_ack_is_idempotent() {
        let mut window = SendWindow::new(3);
        window.push(vec![0]);
        window.push(vec![1]);

        assert_eq!(window.ack_selective(1), SelectiveAck::Marked);
        assert_eq!(window.ack_selective(1), SelectiveAck::Marked);
        assert_eq!(window.ack_selective(0), SelectiveAck::Advanced(2));
        assert!(window.is_empty());
    }

    #[test]
    fn test_recv_window_in_order_delivery() {
        let mut window = RecvWindow::new(4);
        let outcome = window.accept(0, b"A".to_vec());
        assert_eq!(outcome, RecvOutcome::Delivered(vec![b"A".to_vec()]));
        assert_eq!(window.base_seq(), 1);
    }

    #[test]
    fn test_recv_window_reorders() {
        let mut window = RecvWindow::new(4);
        assert_eq!(window.accept(2, b"C".to_vec()), RecvOutcome::Parked);
        assert_eq!(window.accept(1, b"B".to_vec()), RecvOutcome::Parked);
        assert_eq!(window.parked(), 2);

        // Filling the gap releases the whole run in order.
        let outcome = window.accept(0, b"A".to_vec());
        assert_eq!(
            outcome,
            RecvOutcome::Delivered(vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()])
        );
        assert_eq!(window.base_seq(), 3);
        assert_eq!(window.parked(), 0);
    }

    #[test]
    fn test_recv_window_duplicates_and_stale() {
        let mut window = RecvWindow::new(4);
        assert_eq!(window.accept(2, b"C".to_vec()), RecvOutcome::Parked);
        assert_eq!(window.accept(2, b"C".to_vec()), RecvOutcome::Duplicate);

        window.accept(0, b"A".to_vec());
        assert_eq!(window.accept(0, b"A".to_vec()), RecvOutcome::Stale);
    }

    #[test]
    fn test_recv_window_rejects_beyond_limit() {
        let mut window = RecvWindow::new(4);
        assert_eq!(window.accept(4, b"E".to_vec()), RecvOutcome::OutOfRange);
        assert_eq!(window.accept(3, b"D".to_vec()), RecvOutcome::Parked);
    }
}
