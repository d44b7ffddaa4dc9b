//! TTL command implementations (EXPIRE, TTL)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;

/// EXPIRE command - set a key's time to live in seconds
pub struct ExpireCommand;

#[async_trait]
impl Command for ExpireCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let Ok(seconds) = args[1].parse::<i64>() else {
            return CommandResult::Error(
                "ERR value is not an integer or out of range".to_string(),
            );
        };

        let applied = store.expire(&args[0], seconds);
        CommandResult::Ok(ResponseValue::Integer(i64::from(applied)))
    }

    fn name(&self) -> &'static str {
        "EXPIRE"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

/// TTL command - seconds remaining, -1 persistent, -2 missing
pub struct TtlCommand;

#[async_trait]
impl Command for TtlCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        CommandResult::Ok(ResponseValue::Integer(store.ttl(&args[0])))
    }

    fn name(&self) -> &'static str {
        "TTL"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}
