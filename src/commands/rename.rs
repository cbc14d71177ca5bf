use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Renames `key` to `new_key`, overwriting `new_key` if it already exists. It is an error when
/// `key` does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/rename/>
#[derive(Debug, PartialEq)]
pub struct Rename {
    pub key: Bytes,
    pub new_key: Bytes,
}

impl Executable for Rename {
    fn exec(self, store: Store) -> Result<Reply, Error> {
        let res = if store.rename(&self.key, self.new_key)? {
            Reply::ok()
        } else {
            Reply::Error("ERR no such key".to_string())
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Rename {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let new_key = parser.next_bytes()?;

        Ok(Self { key, new_key })
    }
}
