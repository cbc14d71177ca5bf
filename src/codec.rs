use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame, Scanner};
use crate::reply::Reply;

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] frame::Error),
    #[error("Protocol error: frame of at least {size} bytes exceeds the {max} bytes limit")]
    FrameTooLarge { size: usize, max: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns the raw byte stream of a connection into frames and serializes replies back into it.
///
/// Decoding is resumable: while the buffer only holds a prefix of a frame nothing is consumed.
/// The scanner remembers how far the prefix was already checked, and the frame is only built once
/// all of it has arrived.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    scanner: Scanner,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            scanner: Scanner::default(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let length = match self.scanner.check(&src[..]) {
            Ok(length) => length,
            Err(frame::Error::Incomplete) => {
                // Check if the pending frame exceeds the limit to prevent DoS attacks.
                if src.len() > self.max_frame_size {
                    return Err(Error::FrameTooLarge {
                        size: src.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let mut cursor = Cursor::new(&src[..length]);
        let frame = Frame::parse(&mut cursor)?;

        // Remove the parsed frame from the buffer.
        src.advance(length);

        Ok(Some(frame))
    }
}

impl Encoder<Reply> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = reply.serialize();
        dst.reserve(bytes.len());
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}
