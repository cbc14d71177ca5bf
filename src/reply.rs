use bytes::Bytes;

use crate::frame::Frame;

/// The values a command execution can answer with.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Simple(String),
    /// `None` is the null bulk string, sent for missing values.
    Bulk(Option<Bytes>),
    Integer(i64),
    Array(Vec<Option<Bytes>>),
    Error(String),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    pub fn serialize(self) -> Vec<u8> {
        Frame::from(self).serialize()
    }
}

impl From<Reply> for Frame {
    fn from(reply: Reply) -> Self {
        fn bulk(value: Option<Bytes>) -> Frame {
            value.map_or(Frame::Null, Frame::Bulk)
        }

        match reply {
            Reply::Simple(s) => Frame::Simple(s),
            Reply::Bulk(value) => bulk(value),
            Reply::Integer(i) => Frame::Integer(i),
            Reply::Array(values) => Frame::Array(values.into_iter().map(bulk).collect()),
            Reply::Error(msg) => Frame::Error(msg),
        }
    }
}
