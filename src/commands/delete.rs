use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Removes `key`. Replies with the number of keys that were removed, `1` or `0`.
///
/// Ref: <https://redis.io/docs/latest/commands/del/>
#[derive(Debug, PartialEq)]
pub struct Delete {
    pub key: Bytes,
}

impl Executable for Delete {
    fn exec(self, store: Store) -> Result<Reply, Error> {
        let removed = store.delete(&self.key)?;
        Ok(Reply::Integer(i64::from(removed)))
    }
}

impl TryFrom<&mut CommandParser> for Delete {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::frame::Frame;

    fn delete_foo() -> Command {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("DELETE")),
            Frame::Bulk(Bytes::from("foo")),
        ]);
        Command::try_from(frame).unwrap()
    }

    #[test]
    fn existing_key() {
        let store = Store::new();
        store.set(Bytes::from("foo"), Bytes::from("bar")).unwrap();

        let cmd = delete_foo();
        assert_eq!(
            cmd,
            Command::Delete(Delete {
                key: Bytes::from("foo")
            })
        );

        let res = cmd.exec(store.clone()).unwrap();

        assert_eq!(res, Reply::Integer(1));
        assert_eq!(store.get(b"foo").unwrap(), None);
    }

    #[test]
    fn missing_key() {
        let store = Store::new();
        store.set(Bytes::from("bar"), Bytes::from("1")).unwrap();

        assert_eq!(delete_foo().exec(store.clone()).unwrap(), Reply::Integer(0));
        assert_eq!(delete_foo().exec(store.clone()).unwrap(), Reply::Integer(0));
        assert_eq!(store.keys().unwrap(), vec![Bytes::from("bar")]);
    }

    #[test]
    fn invalid_frame() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("DELETE")), Frame::Integer(42)]);
        let err = Command::try_from(frame).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::InvalidFrame {
                expected: "bulk string".to_string(),
                actual: Frame::Integer(42)
            }
        );
    }
}
