//! Core wire types: the frame layout and its checksum.

pub mod checksum;
pub mod frame;

pub use checksum::Checksum;
pub use frame::{Frame, HEADER_SIZE, Header, MAX_PAYLOAD};
