//! Window bookkeeping shared by the protocol variants.

pub mod window;

pub use window::{RecvOutcome, RecvSlot, RecvWindow, SelectiveAck, SendSlot, SendWindow};
