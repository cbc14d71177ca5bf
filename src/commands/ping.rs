use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

/// Returns PONG. Used by clients to check that the connection is alive.
///
/// Ref: <https://redis.io/docs/latest/commands/ping/>
#[derive(Debug, PartialEq)]
pub struct Ping;

impl Executable for Ping {
    fn exec(self, _store: Store) -> Result<Reply, Error> {
        Ok(Reply::Simple("PONG".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
