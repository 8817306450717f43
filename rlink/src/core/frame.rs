//! Frame definition and wire codec.
//!
//! A frame is the unit of transmission on the link: a fixed header followed
//! by up to 255 payload bytes.
//!
//! # Frame Format
//!
//! ```text
//!  0               4               8              12   13
//! +---------------+---------------+---------------+----+--------------+
//! |   checksum    |   sequence    |      ack      | len| payload(len) |
//! +---------------+---------------+---------------+----+--------------+
//! ```
//!
//! All integers are big-endian. The checksum covers everything after
//! itself (bytes 4 onward). A frame with `len == 0` carries no data and is
//! read as a pure acknowledgment.

use crate::core::checksum::Checksum;
use crate::error::{Error, Result};

/// Frame header size in bytes.
pub const HEADER_SIZE: usize = 13;

/// Maximum payload a single frame can carry (one-byte length field).
pub const MAX_PAYLOAD: usize = 255;

/// A decoded, verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number, from the sender's numbering.
    pub seq: u32,

    /// Acknowledgment number, from the receiver's bookkeeping. Cumulative
    /// (next expected) under Go-Back-N, a specific received sequence under
    /// Selective Repeat.
    pub ack: u32,

    /// Application bytes; empty for a pure acknowledgment.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a data frame.
    pub fn new(seq: u32, ack: u32, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self { seq, ack, payload }
    }

    /// Creates a payload-less acknowledgment frame.
    pub fn ack_only(seq: u32, ack: u32) -> Self {
        Self {
            seq,
            ack,
            payload: Vec::new(),
        }
    }

    /// Returns true if this frame carries no data.
    pub fn is_ack(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serializes the frame, prepending the checksum of everything after it.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);

        let checksum = Checksum::compute(&buf[4..]);
        buf[0..4].copy_from_slice(&checksum.to_be_bytes());
        buf
    }
}

/// A parsed frame header, before the payload has been read and verified.
///
/// Decoding is split in two because the channel is a byte stream: the
/// header's length field says how many payload bytes to consume next, and
/// only then can the checksum be checked.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    /// Checksum stored by the sender.
    pub checksum: u32,

    /// Sequence number.
    pub seq: u32,

    /// Acknowledgment number.
    pub ack: u32,

    /// Payload length that follows on the wire.
    pub len: u8,
}

impl Header {
    /// Parses the fixed-size header.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            checksum: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            seq: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ack: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            len: buf[12],
        }
    }

    /// Verifies the payload against the stored checksum and assembles the
    /// frame. Returns [`Error::Checksum`] when the frame was damaged in
    /// transit; the caller has already consumed its bytes either way.
    pub fn into_frame(self, payload: Vec<u8>) -> Result<Frame> {
        debug_assert_eq!(payload.len(), self.len as usize);

        let mut checksum = Checksum::new();
        checksum.update(&self.seq.to_be_bytes());
        checksum.update(&self.ack.to_be_bytes());
        checksum.update(&[self.len]);
        checksum.update(&payload);

        if checksum.finalize() != self.checksum {
            return Err(Error::Checksum);
        }

        Ok(Frame {
            seq: self.seq,
            ack: self.ack,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Frame> {
        let mut header_buf = [0u8; HEADER_SIZE];
        header_buf.copy_from_slice(&bytes[..HEADER_SIZE]);
        Header::parse(&header_buf).into_frame(bytes[HEADER_SIZE..].to_vec())
    }

    #[test]
    fn test_roundtrip() {
        let frame = Frame::new(7, 3, b"Hello, link!".to_vec());
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_SIZE + 12);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_ack_only_roundtrip() {
        let frame = Frame::ack_only(0, 42);
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_ack());
        assert_eq!(decoded.ack, 42);
    }

    #[test]
    fn test_wire_layout_is_big_endian() {
        let frame = Frame::new(0x01020304, 0x0a0b0c0d, vec![0xee]);
        let bytes = frame.encode();
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[8..12], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(bytes[12], 1);
        assert_eq!(bytes[13], 0xee);
    }

    #[test]
    fn test_any_single_byte_flip_is_rejected() {
        let frame = Frame::new(9, 1, b"payload".to_vec());
        let bytes = frame.encode();

        for index in 0..bytes.len() {
            let mut copy = bytes.clone();
            copy[index] ^= 0x20;
            // Flips in the length byte change how many payload bytes the
            // caller would have read; emulate that by resizing.
            if index == 12 {
                copy.resize(HEADER_SIZE + copy[12] as usize, 0);
            }
            assert!(
                matches!(decode(&copy), Err(Error::Checksum)),
                "flip at byte {index} went undetected"
            );
        }
    }

    #[test]
    fn test_max_payload() {
        let frame = Frame::new(0, 0, vec![0xab; MAX_PAYLOAD]);
        let bytes = frame.encode();
        assert_eq!(bytes[12], 255);
        assert_eq!(decode(&bytes).unwrap().payload.len(), MAX_PAYLOAD);
    }
}
