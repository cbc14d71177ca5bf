use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Set `key` to hold `value`, overwriting whatever it held before.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Set {
    fn exec(self, store: Store) -> Result<Reply, Error> {
        store.set(self.key, self.value)?;
        Ok(Reply::ok())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}
