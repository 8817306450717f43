//! Demo application protocol: opcode/length-framed commands and responses.
//!
//! Messages ride the reliable byte stream the link provides: one opcode
//! byte, one length byte, then the body. Bodies are capped so an encoded
//! message always fits in a single link chunk.
//!
//! The viewer sends [`Opcode::List`] or [`Opcode::Play`]; the catalog
//! server answers with a run of [`Opcode::Catalog`] or [`Opcode::Chunk`]
//! messages terminated by [`Opcode::End`], or a single [`Opcode::Error`].

use crate::error::{Error, Result};
use crate::link::Endpoint;

/// Largest message body, keeping `opcode + len + body` within one chunk.
pub const MAX_BODY: usize = 254;

/// Message kinds exchanged by the viewer and the catalog server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Request the list of available videos.
    List = 0x01,

    /// Request playback of the named video.
    Play = 0x02,

    /// One catalog entry.
    Catalog = 0x81,

    /// One slice of video data.
    Chunk = 0x82,

    /// End of the current response.
    End = 0x83,

    /// The request failed; the body describes why.
    Error = 0x84,
}

impl Opcode {
    /// Converts a wire byte to an opcode.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::List),
            0x02 => Some(Self::Play),
            0x81 => Some(Self::Catalog),
            0x82 => Some(Self::Chunk),
            0x83 => Some(Self::End),
            0x84 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A framed application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub opcode: Opcode,
    pub body: Vec<u8>,
}

impl Message {
    /// Creates a message, rejecting bodies the length byte cannot express.
    pub fn new(opcode: Opcode, body: impl Into<Vec<u8>>) -> Result<Self> {
        let body = body.into();
        if body.len() > MAX_BODY {
            return Err(Error::BodyTooLarge(body.len()));
        }
        Ok(Self { opcode, body })
    }

    /// Creates a body-less message.
    pub fn empty(opcode: Opcode) -> Self {
        Self {
            opcode,
            body: Vec::new(),
        }
    }

    /// Serializes the message: opcode, length, body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.body.len());
        buf.push(self.opcode as u8);
        buf.push(self.body.len() as u8);
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Sends one message over the link.
pub async fn send_message(endpoint: &Endpoint, message: &Message) -> Result<()> {
    endpoint.send(&message.encode()).await
}

/// Reads one message off the link, blocking until it is complete.
pub async fn read_message(endpoint: &Endpoint) -> Result<Message> {
    let head = endpoint.recv(2).await?;
    let opcode = Opcode::from_u8(head[0]).ok_or(Error::UnknownOpcode(head[0]))?;
    let len = head[1] as usize;
    let body = if len > 0 {
        endpoint.recv(len).await?
    } else {
        Vec::new()
    };
    Ok(Message { opcode, body })
}
