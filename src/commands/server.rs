//! Connection-level commands (PING, ECHO)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;

/// PING command
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    async fn execute(&self, _args: &[String], _store: &MemoryStore) -> CommandResult {
        CommandResult::Ok(ResponseValue::SimpleString("PONG".to_string()))
    }

    fn name(&self) -> &'static str {
        "PING"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(1)
    }
}

/// ECHO command - reply with the given message as a bulk string
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    async fn execute(&self, args: &[String], _store: &MemoryStore) -> CommandResult {
        CommandResult::Ok(ResponseValue::BulkString(Some(args[0].clone())))
    }

    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}
