//! Command implementations and the dispatch framework
//!
//! Each RESP command is a small struct implementing [`Command`]; the
//! [`CommandRegistry`] owns the lookup table, validates arity, and produces
//! the reply value the codec encodes.

pub mod atomic;
pub mod hash;
pub mod keyspace;
pub mod list;
pub mod registry;
pub mod server;
pub mod string;
pub mod ttl;

pub use atomic::IncrCommand;
pub use hash::{
    HDelCommand, HExistsCommand, HGetAllCommand, HGetCommand, HKeysCommand, HLenCommand,
    HMSetCommand, HSetCommand, HValsCommand,
};
pub use keyspace::{DelCommand, FlushAllCommand, KeysCommand, RenameCommand, TypeCommand};
pub use list::{
    LGetCommand, LIndexCommand, LLenCommand, LPopCommand, LPushCommand, LRangeCommand,
    LRemCommand, LSetCommand, RPopCommand, RPushCommand,
};
pub use registry::{Command, CommandRegistry, CommandResult, ParsedCommand};
pub use server::{EchoCommand, PingCommand};
pub use string::{GetCommand, SetCommand};
pub use ttl::{ExpireCommand, TtlCommand};

/// Reply values, one variant per RESP reply shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<String>),
    Array(Vec<ResponseValue>),
    Nil,
}

/// Command arity, counted over all tokens including the command name.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArity {
    Fixed(usize),
    Range(usize, usize),
    AtLeast(usize),
}
