//! List command implementations
//!
//! LPUSH and RPUSH accept multiple values and reply with the resulting list
//! length. LGET is a non-standard convenience equivalent to `LRANGE key 0 -1`.

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::error::Result;
use crate::storage::MemoryStore;
use async_trait::async_trait;

fn integer_reply(result: Result<usize>) -> CommandResult {
    match result {
        Ok(n) => CommandResult::Ok(ResponseValue::Integer(n as i64)),
        Err(e) => CommandResult::Error(e.to_client_error()),
    }
}

fn bulk_reply(result: Result<Option<String>>) -> CommandResult {
    match result {
        Ok(Some(value)) => CommandResult::Ok(ResponseValue::BulkString(Some(value))),
        Ok(None) => CommandResult::Ok(ResponseValue::BulkString(None)),
        Err(e) => CommandResult::Error(e.to_client_error()),
    }
}

fn array_reply(result: Result<Vec<String>>) -> CommandResult {
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

fn parse_index(token: &str) -> std::result::Result<i64, CommandResult> {
    token.parse::<i64>().map_err(|_| {
        CommandResult::Error("ERR value is not an integer or out of range".to_string())
    })
}

/// LPUSH command
pub struct LPushCommand;

#[async_trait]
impl Command for LPushCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let key = &args[0];
        let mut length = 0;
        for value in &args[1..] {
            match store.lpush(key, value.clone()) {
                Ok(n) => length = n,
                Err(e) => return CommandResult::Error(e.to_client_error()),
            }
        }
        CommandResult::Ok(ResponseValue::Integer(length as i64))
    }

    fn name(&self) -> &'static str {
        "LPUSH"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(3)
    }
}

/// RPUSH command
pub struct RPushCommand;

#[async_trait]
impl Command for RPushCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let key = &args[0];
        let mut length = 0;
        for value in &args[1..] {
            match store.rpush(key, value.clone()) {
                Ok(n) => length = n,
                Err(e) => return CommandResult::Error(e.to_client_error()),
            }
        }
        CommandResult::Ok(ResponseValue::Integer(length as i64))
    }

    fn name(&self) -> &'static str {
        "RPUSH"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(3)
    }
}

/// LPOP command
pub struct LPopCommand;

#[async_trait]
impl Command for LPopCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        bulk_reply(store.lpop(&args[0]))
    }

    fn name(&self) -> &'static str {
        "LPOP"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// RPOP command
pub struct RPopCommand;

#[async_trait]
impl Command for RPopCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        bulk_reply(store.rpop(&args[0]))
    }

    fn name(&self) -> &'static str {
        "RPOP"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// LLEN command
pub struct LLenCommand;

#[async_trait]
impl Command for LLenCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        integer_reply(store.llen(&args[0]))
    }

    fn name(&self) -> &'static str {
        "LLEN"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// LRANGE command
pub struct LRangeCommand;

#[async_trait]
impl Command for LRangeCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let start = match parse_index(&args[1]) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let stop = match parse_index(&args[2]) {
            Ok(n) => n,
            Err(e) => return e,
        };
        array_reply(store.lrange(&args[0], start, stop))
    }

    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(4)
    }
}

/// LREM command
pub struct LRemCommand;

#[async_trait]
impl Command for LRemCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let count = match parse_index(&args[1]) {
            Ok(n) => n,
            Err(e) => return e,
        };
        match store.lrem(&args[0], count, &args[2]) {
            Ok(removed) => CommandResult::Ok(ResponseValue::Integer(removed)),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "LREM"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(4)
    }
}

/// LINDEX command
pub struct LIndexCommand;

#[async_trait]
impl Command for LIndexCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let index = match parse_index(&args[1]) {
            Ok(n) => n,
            Err(e) => return e,
        };
        bulk_reply(store.lindex(&args[0], index))
    }

    fn name(&self) -> &'static str {
        "LINDEX"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

/// LSET command
pub struct LSetCommand;

#[async_trait]
impl Command for LSetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let index = match parse_index(&args[1]) {
            Ok(n) => n,
            Err(e) => return e,
        };
        match store.lset(&args[0], index, args[2].clone()) {
            Ok(true) => CommandResult::Ok(ResponseValue::SimpleString("OK".to_string())),
            Ok(false) => CommandResult::Error("ERR index out of range".to_string()),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "LSET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(4)
    }
}

/// LGET command - the whole list, oldest to newest
pub struct LGetCommand;

#[async_trait]
impl Command for LGetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        array_reply(store.lget(&args[0]))
    }

    fn name(&self) -> &'static str {
        "LGET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn bulk_array(items: &[&str]) -> ResponseValue {
        ResponseValue::Array(
            items
                .iter()
                .map(|item| ResponseValue::BulkString(Some(item.to_string())))
                .collect(),
        )
    }

    #[tokio::test]
    async fn pushes_reply_with_the_new_length() {
        let store = MemoryStore::new();

        let r1 = LPushCommand.execute(&args(&["mylist", "a"]), &store).await;
        assert_eq!(r1, CommandResult::Ok(ResponseValue::Integer(1)));

        let r2 = LPushCommand.execute(&args(&["mylist", "b"]), &store).await;
        assert_eq!(r2, CommandResult::Ok(ResponseValue::Integer(2)));

        let r3 = RPushCommand.execute(&args(&["mylist", "c"]), &store).await;
        assert_eq!(r3, CommandResult::Ok(ResponseValue::Integer(3)));

        let range = LRangeCommand
            .execute(&args(&["mylist", "0", "-1"]), &store)
            .await;
        assert_eq!(range, CommandResult::Ok(bulk_array(&["b", "a", "c"])));
    }

    #[tokio::test]
    async fn variadic_push_inserts_in_argument_order() {
        let store = MemoryStore::new();
        let result = RPushCommand
            .execute(&args(&["l", "a", "b", "c"]), &store)
            .await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Integer(3)));
        assert_eq!(store.lget("l").unwrap(), vec!["a", "b", "c"]);

        LPushCommand.execute(&args(&["l2", "a", "b"]), &store).await;
        assert_eq!(store.lget("l2").unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn pops_return_nil_when_empty() {
        let store = MemoryStore::new();
        store.rpush("l", "only".to_string()).unwrap();

        let popped = LPopCommand.execute(&args(&["l"]), &store).await;
        assert_eq!(
            popped,
            CommandResult::Ok(ResponseValue::BulkString(Some("only".to_string())))
        );

        let empty = RPopCommand.execute(&args(&["l"]), &store).await;
        assert_eq!(empty, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test]
    async fn llen_counts_elements() {
        let store = MemoryStore::new();
        RPushCommand.execute(&args(&["l", "a", "b"]), &store).await;

        let result = LLenCommand.execute(&args(&["l"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Integer(2)));

        let missing = LLenCommand.execute(&args(&["ghost"]), &store).await;
        assert_eq!(missing, CommandResult::Ok(ResponseValue::Integer(0)));
    }

    #[tokio::test]
    async fn lindex_handles_negative_and_out_of_range() {
        let store = MemoryStore::new();
        RPushCommand
            .execute(&args(&["l", "a", "b", "c"]), &store)
            .await;

        let tail = LIndexCommand.execute(&args(&["l", "-1"]), &store).await;
        assert_eq!(
            tail,
            CommandResult::Ok(ResponseValue::BulkString(Some("c".to_string())))
        );

        let gone = LIndexCommand.execute(&args(&["l", "9"]), &store).await;
        assert_eq!(gone, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test]
    async fn lset_overwrites_or_rejects() {
        let store = MemoryStore::new();
        RPushCommand.execute(&args(&["l", "a", "b"]), &store).await;

        let ok = LSetCommand.execute(&args(&["l", "-1", "z"]), &store).await;
        assert_eq!(
            ok,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );
        assert_eq!(store.lget("l").unwrap(), vec!["a", "z"]);

        let out_of_range = LSetCommand.execute(&args(&["l", "5", "q"]), &store).await;
        assert_eq!(
            out_of_range,
            CommandResult::Error("ERR index out of range".to_string())
        );
    }

    #[tokio::test]
    async fn lrem_respects_count_direction() {
        let store = MemoryStore::new();
        RPushCommand
            .execute(&args(&["l", "x", "a", "x", "b", "x"]), &store)
            .await;

        let removed = LRemCommand.execute(&args(&["l", "-2", "x"]), &store).await;
        assert_eq!(removed, CommandResult::Ok(ResponseValue::Integer(2)));
        assert_eq!(store.lget("l").unwrap(), vec!["x", "a", "b"]);
    }

    #[tokio::test]
    async fn lget_returns_the_whole_list() {
        let store = MemoryStore::new();
        RPushCommand.execute(&args(&["l", "a", "b"]), &store).await;

        let result = LGetCommand.execute(&args(&["l"]), &store).await;
        assert_eq!(result, CommandResult::Ok(bulk_array(&["a", "b"])));

        let missing = LGetCommand.execute(&args(&["ghost"]), &store).await;
        assert_eq!(missing, CommandResult::Ok(bulk_array(&[])));
    }

    #[tokio::test]
    async fn non_numeric_indexes_are_argument_errors() {
        let store = MemoryStore::new();
        let result = LRangeCommand
            .execute(&args(&["l", "zero", "-1"]), &store)
            .await;
        assert!(matches!(result, CommandResult::Error(_)));

        let result = LRemCommand.execute(&args(&["l", "all", "x"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn list_commands_on_string_key_report_wrong_type() {
        let store = MemoryStore::new();
        store.set("s", "v".to_string());

        for result in [
            LPushCommand.execute(&args(&["s", "a"]), &store).await,
            LPopCommand.execute(&args(&["s"]), &store).await,
            LLenCommand.execute(&args(&["s"]), &store).await,
            LRangeCommand.execute(&args(&["s", "0", "-1"]), &store).await,
        ] {
            assert!(matches!(result, CommandResult::Error(msg) if msg.starts_with("ERR")));
        }
    }
}
