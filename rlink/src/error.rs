//! Error types for link operations.

use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the link and the demo application framing.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame failed checksum verification. Never escapes the receive path;
    /// the frame is discarded and the link keeps running.
    #[error("checksum mismatch")]
    Checksum,

    /// Chunk handed to `send` exceeds the configured maximum.
    #[error("chunk of {0} bytes exceeds the maximum chunk size")]
    ChunkTooLarge(usize),

    /// The endpoint has shut down; no further sends or receives complete.
    #[error("link shut down")]
    Shutdown,

    /// The underlying channel failed.
    #[error("channel I/O: {0}")]
    Io(#[from] std::io::Error),

    /// An application message carried an opcode this peer does not know.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Application message body does not fit the one-byte length field.
    #[error("message body of {0} bytes exceeds the one-byte length limit")]
    BodyTooLarge(usize),
}
