// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

// Upper bound on the number of elements pre-allocated for an array. The declared length comes
// straight from the client, so it must not drive the allocation size on its own.
const MAX_ARRAY_PREALLOC: usize = 1024;

/// How many arrays may be nested inside each other. Requests are flat arrays of bulk strings.
pub const MAX_DEPTH: usize = 8;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type {0:?}")]
    InvalidDataType(char),
    #[error("invalid length {0:?}")]
    InvalidLength(String),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("expected CRLF terminator")]
    MissingTerminator,
    #[error("invalid UTF-8 in frame")]
    InvalidUtf8(#[from] FromUtf8Error),
    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Parses exactly one frame starting at the cursor position. On success the cursor is left
    /// right after the frame. `Error::Incomplete` means the input is a strict prefix of a valid
    /// frame and the caller should retry from the start once more bytes are available.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    // `depth` is the number of arrays enclosing the frame at the cursor.
    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?.to_vec();
                Ok(Frame::Simple(String::from_utf8(line)?))
            }
            DataType::SimpleError => {
                let line = get_line(src)?.to_vec();
                Ok(Frame::Error(String::from_utf8(line)?))
            }
            DataType::Integer => {
                let line = get_line(src)?;
                let integer = std::str::from_utf8(line)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        Error::InvalidInteger(String::from_utf8_lossy(line).into_owned())
                    })?;

                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = match parse_length(get_line(src)?)? {
                    Some(length) => length,
                    None => return Ok(Frame::Null),
                };

                let data = get_payload(src, length)?;
                Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                if depth >= MAX_DEPTH {
                    return Err(Error::TooDeep(MAX_DEPTH));
                }

                let length = match parse_length(get_line(src)?)? {
                    Some(length) => length,
                    None => return Ok(Frame::Null),
                };

                let mut frames = Vec::with_capacity(length.min(MAX_ARRAY_PREALLOC));
                for _ in 0..length {
                    frames.push(Self::parse_nested(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                dst.push(u8::from(DataType::SimpleString));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.push(u8::from(DataType::SimpleError));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.push(u8::from(DataType::Integer));
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.push(u8::from(DataType::BulkString));
                dst.extend_from_slice(bytes.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(bytes);
                dst.extend_from_slice(CRLF);
            }
            // RESP2 null bulk string. There is no payload and no trailing CRLF after the length.
            Frame::Null => {
                dst.push(u8::from(DataType::BulkString));
                dst.extend_from_slice(b"-1");
                dst.extend_from_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.push(u8::from(DataType::Array));
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Finds where the frame at the head of a buffer ends, without building it.
///
/// The buffer may only grow between calls until a frame is found. Progress is kept across calls,
/// so a frame that arrives in many pieces is scanned once overall instead of once per piece.
#[derive(Clone, Debug, Default)]
pub struct Scanner {
    // Offset right after the last complete element.
    position: usize,
    // Elements still expected by each open array, outermost first.
    pending: Vec<usize>,
    // No `\r` of the line being searched comes before this offset.
    line_hint: usize,
}

enum Element {
    Complete,
    Array(usize),
}

impl Scanner {
    /// Returns the length of the first frame in `buf` once all of it is available. Fails with
    /// `Error::Incomplete` until then. The scanner starts over after a frame is found.
    pub fn check(&mut self, buf: &[u8]) -> Result<usize, Error> {
        loop {
            match self.next_element(buf)? {
                Element::Array(length) if length > 0 => self.pending.push(length),
                _ => {
                    if self.close_arrays() {
                        let length = self.position;
                        *self = Scanner::default();
                        return Ok(length);
                    }
                }
            }
        }
    }

    /// Counts a finished element against the arrays it completes. Returns whether the outermost
    /// frame is done.
    fn close_arrays(&mut self) -> bool {
        while let Some(remaining) = self.pending.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return false;
            }
            self.pending.pop();
        }
        true
    }

    /// Steps over one element header, plus the payload of scalars. Nothing moves unless the whole
    /// step succeeds.
    fn next_element(&mut self, buf: &[u8]) -> Result<Element, Error> {
        let mut src = Cursor::new(buf);
        src.set_position(self.position as u64);

        let data_type = DataType::try_from(get_byte(&mut src)?)?;
        if matches!(data_type, DataType::Array) && self.pending.len() >= MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }

        let line = self.find_line(&mut src)?;
        let element = match data_type {
            DataType::SimpleString | DataType::SimpleError | DataType::Integer => Element::Complete,
            DataType::BulkString => {
                if let Some(length) = parse_length(line)? {
                    get_payload(&mut src, length)?;
                }
                Element::Complete
            }
            DataType::Array => Element::Array(parse_length(line)?.unwrap_or(0)),
        };

        self.position = src.position() as usize;
        Ok(element)
    }

    /// Same as `get_line`, but a line that is still being received is not searched again from its
    /// start on the next call.
    fn find_line<'a>(&mut self, src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
        let buf: &'a [u8] = *src.get_ref();
        let start = src.position() as usize;
        let from = self.line_hint.max(start);

        let cr = match buf
            .get(from..)
            .unwrap_or_default()
            .iter()
            .position(|&b| b == b'\r')
        {
            Some(index) => from + index,
            None => {
                self.line_hint = buf.len();
                return Err(Error::Incomplete);
            }
        };

        match buf.get(cr + 1) {
            None => {
                self.line_hint = cr;
                Err(Error::Incomplete)
            }
            Some(b'\n') => {
                self.line_hint = 0;
                src.set_position((cr + CRLF.len()) as u64);
                Ok(&buf[start..cr])
            }
            Some(_) => Err(Error::MissingTerminator),
        }
    }
}

/// Returns the bytes up to the next CRLF and moves the cursor past it. The first `\r` found must
/// be the start of the terminator.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;

    let cr = buf[start..]
        .iter()
        .position(|&b| b == b'\r')
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    match buf.get(cr + 1) {
        None => Err(Error::Incomplete),
        Some(b'\n') => {
            src.set_position((cr + CRLF.len()) as u64);
            Ok(&buf[start..cr])
        }
        Some(_) => Err(Error::MissingTerminator),
    }
}

/// Returns exactly `length` bytes followed by a CRLF. Bytes that are present but do not match the
/// terminator are rejected right away instead of waiting for more input.
fn get_payload<'a>(src: &mut Cursor<&'a [u8]>, length: usize) -> Result<&'a [u8], Error> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;
    let end = start.checked_add(length).ok_or(Error::Incomplete)?;

    let trailer = buf.get(end..).unwrap_or_default();
    for (expected, actual) in CRLF.iter().zip(trailer) {
        if expected != actual {
            return Err(Error::MissingTerminator);
        }
    }

    if trailer.len() < CRLF.len() {
        return Err(Error::Incomplete);
    }

    src.set_position((end + CRLF.len()) as u64);
    Ok(&buf[start..end])
}

/// Parses a bulk string or array length. `-1` is the null sentinel and maps to `None`.
fn parse_length(line: &[u8]) -> Result<Option<usize>, Error> {
    if line == b"-1" {
        return Ok(None);
    }

    let invalid = || Error::InvalidLength(String::from_utf8_lossy(line).into_owned());

    if line.is_empty() || !line.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .map(Some)
        .ok_or_else(invalid)
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(char::from(byte))),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
