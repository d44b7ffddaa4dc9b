//! Hash command implementations

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::error::Result;
use crate::storage::MemoryStore;
use async_trait::async_trait;

fn bool_reply(result: Result<bool>) -> CommandResult {
    match result {
        Ok(flag) => CommandResult::Ok(ResponseValue::Integer(i64::from(flag))),
        Err(e) => CommandResult::Error(e.to_client_error()),
    }
}

fn string_array_reply(result: Result<Vec<String>>) -> CommandResult {
    match result {
        Ok(items) => CommandResult::Ok(ResponseValue::Array(
            items
                .into_iter()
                .map(|item| ResponseValue::BulkString(Some(item)))
                .collect(),
        )),
        Err(e) => CommandResult::Error(e.to_client_error()),
    }
}

/// HSET command - set one field, replying 1 when the field is new
pub struct HSetCommand;

#[async_trait]
impl Command for HSetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        bool_reply(store.hset(&args[0], &args[1], args[2].clone()))
    }

    fn name(&self) -> &'static str {
        "HSET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(4)
    }
}

/// HGET command
pub struct HGetCommand;

#[async_trait]
impl Command for HGetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        match store.hget(&args[0], &args[1]) {
            Ok(Some(value)) => CommandResult::Ok(ResponseValue::BulkString(Some(value))),
            Ok(None) => CommandResult::Ok(ResponseValue::BulkString(None)),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "HGET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

/// HEXISTS command
pub struct HExistsCommand;

#[async_trait]
impl Command for HExistsCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        bool_reply(store.hexists(&args[0], &args[1]))
    }

    fn name(&self) -> &'static str {
        "HEXISTS"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

/// HDEL command - remove one field
pub struct HDelCommand;

#[async_trait]
impl Command for HDelCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        bool_reply(store.hdel(&args[0], &args[1]))
    }

    fn name(&self) -> &'static str {
        "HDEL"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

/// HGETALL command - flat field/value array
pub struct HGetAllCommand;

#[async_trait]
impl Command for HGetAllCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        match store.hgetall(&args[0]) {
            Ok(pairs) => {
                let mut items = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    items.push(ResponseValue::BulkString(Some(field)));
                    items.push(ResponseValue::BulkString(Some(value)));
                }
                CommandResult::Ok(ResponseValue::Array(items))
            }
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "HGETALL"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// HKEYS command
pub struct HKeysCommand;

#[async_trait]
impl Command for HKeysCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        string_array_reply(store.hkeys(&args[0]))
    }

    fn name(&self) -> &'static str {
        "HKEYS"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// HVALS command
pub struct HValsCommand;

#[async_trait]
impl Command for HValsCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        string_array_reply(store.hvals(&args[0]))
    }

    fn name(&self) -> &'static str {
        "HVALS"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// HLEN command
pub struct HLenCommand;

#[async_trait]
impl Command for HLenCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        match store.hlen(&args[0]) {
            Ok(len) => CommandResult::Ok(ResponseValue::Integer(len as i64)),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "HLEN"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// HMSET command - set several fields at once
pub struct HMSetCommand;

#[async_trait]
impl Command for HMSetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        // key plus field/value pairs
        if args.len() % 2 != 1 {
            return CommandResult::Error(
                "ERR wrong number of arguments for 'HMSET' command".to_string(),
            );
        }

        let pairs = args[1..]
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        match store.hmset(&args[0], pairs) {
            Ok(()) => CommandResult::Ok(ResponseValue::SimpleString("OK".to_string())),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "HMSET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(4)
    }
}
