//! Reliable ordered byte streams over an unreliable channel.
//!
//! The channel underneath may silently drop a whole frame or rewrite one of
//! its bytes; this crate recovers an exactly-once, in-order byte stream on
//! top of it with a sliding-window retransmission protocol. Two window
//! disciplines are provided and selected at construction: Go-Back-N
//! (cumulative acks, whole-window retransmission) and Selective Repeat
//! (per-frame acks and timers, receive-side reordering). Both ends of a
//! link must use the same discipline; the wire format is shared.
//!
//! # Crate structure
//!
//! - [`core`](crate::core) — frame layout, wire codec, and the additive checksum
//! - [`buffer`] — send/receive window bookkeeping
//! - [`link`] — the [`Endpoint`]: send/recv API, receive task, timers
//! - [`phys`] — lossy channel emulation and the frame write abstraction
//! - [`stats`] — per-endpoint counters and the analysis log format
//! - [`config`] — protocol modes, knobs, and their defaults
//! - [`app`] — the opcode/length message framing used by the demo binaries

pub mod app;
pub mod buffer;
pub mod config;
pub mod core;
pub mod error;
pub mod link;
pub mod phys;
pub mod stats;

pub use crate::config::{Config, MAX_CHUNK, Mode, Role};
pub use crate::core::frame::{Frame, HEADER_SIZE, MAX_PAYLOAD};
pub use crate::error::{Error, Result};
pub use crate::link::Endpoint;
pub use crate::phys::{FrameSink, Impairment, LossySink};
pub use crate::stats::LinkStats;
