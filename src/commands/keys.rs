use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Returns every key in the store, in no particular order.
///
/// Ref: <https://redis.io/docs/latest/commands/keys/>
#[derive(Debug, PartialEq)]
pub struct Keys;

impl Executable for Keys {
    fn exec(self, store: Store) -> Result<Reply, Error> {
        let keys = store.keys()?.into_iter().map(Some).collect();
        Ok(Reply::Array(keys))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
