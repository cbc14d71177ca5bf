pub mod delete;
pub mod executable;
pub mod get;
pub mod keys;
pub mod ping;
pub mod rename;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

use delete::Delete;
use get::Get;
use keys::Keys;
use ping::Ping;
use rename::Rename;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Delete(Delete),
    Get(Get),
    Keys(Keys),
    Ping(Ping),
    Rename(Rename),
    Set(Set),
}

impl Executable for Command {
    fn exec(self, store: Store) -> Result<Reply, Error> {
        match self {
            Command::Delete(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Keys(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Rename(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as arrays of bulk strings.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "non-empty array".to_string(),
                    actual: frame,
                })
            }
        };

        let parts = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(bytes),
                frame => Err(CommandParserError::InvalidFrame {
                    expected: "bulk string".to_string(),
                    actual: frame,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut parts = parts.into_iter();
        let name = match parts.next() {
            Some(name) => name,
            None => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "non-empty array".to_string(),
                    actual: Frame::Array(vec![]),
                })
            }
        };

        let command = match str::from_utf8(&name) {
            Ok(name) => name.to_lowercase(),
            Err(_) => {
                return Err(CommandParserError::UnknownCommand {
                    command: String::from_utf8_lossy(&name).into_owned(),
                })
            }
        };

        let parser = &mut CommandParser {
            command: command.clone(),
            parts,
        };

        let cmd = match &command[..] {
            "delete" => Delete::try_from(&mut *parser).map(Command::Delete),
            "get" => Get::try_from(&mut *parser).map(Command::Get),
            "keys" => Keys::try_from(&mut *parser).map(Command::Keys),
            "ping" => Ping::try_from(&mut *parser).map(Command::Ping),
            "rename" => Rename::try_from(&mut *parser).map(Command::Rename),
            "set" => Set::try_from(&mut *parser).map(Command::Set),
            _ => Err(CommandParserError::UnknownCommand {
                command: String::from_utf8_lossy(&name).into_owned(),
            }),
        }?;

        parser.finish()?;

        Ok(cmd)
    }
}

/// Hands out the arguments of a request, one at a time, to the command being built.
pub struct CommandParser {
    command: String,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.parts.next().ok_or_else(|| self.wrong_arity())
    }

    /// Fails when arguments are left over after the command took what it needs.
    fn finish(&mut self) -> Result<(), CommandParserError> {
        match self.parts.next() {
            Some(_) => Err(self.wrong_arity()),
            None => Ok(()),
        }
    }

    fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongArity {
            command: self.command.clone(),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("Protocol error: expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
}

impl CommandParserError {
    /// Whether the request was well formed and the connection can keep going after reporting the
    /// error to the client. Malformed requests are protocol violations.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CommandParserError::InvalidFrame { .. } => false,
            CommandParserError::UnknownCommand { .. } | CommandParserError::WrongArity { .. } => {
                true
            }
        }
    }

    pub fn to_reply(&self) -> Reply {
        Reply::Error(format!("ERR {}", self))
    }
}
