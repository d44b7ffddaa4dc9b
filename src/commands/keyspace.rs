//! Keyspace command implementations (DEL/UNLINK, FLUSHALL, KEYS, TYPE, RENAME)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;

/// DEL command - remove one or more keys, replying with the count removed.
/// UNLINK is an alias; there is no separate lazy-free path here.
pub struct DelCommand;

#[async_trait]
impl Command for DelCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let mut removed = 0i64;
        for key in args {
            if store.del(key) {
                removed += 1;
            }
        }
        CommandResult::Ok(ResponseValue::Integer(removed))
    }

    fn name(&self) -> &'static str {
        "DEL"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(2)
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["UNLINK"]
    }
}

/// FLUSHALL command - drop every key and expiry
pub struct FlushAllCommand;

#[async_trait]
impl Command for FlushAllCommand {
    async fn execute(&self, _args: &[String], store: &MemoryStore) -> CommandResult {
        store.flush_all();
        CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
    }

    fn name(&self) -> &'static str {
        "FLUSHALL"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(1)
    }
}

/// KEYS command - list all live keys. Only the `*` pattern is supported.
pub struct KeysCommand;

#[async_trait]
impl Command for KeysCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        if let Some(pattern) = args.first() {
            if pattern != "*" {
                return CommandResult::Error(
                    "ERR only the '*' pattern is supported".to_string(),
                );
            }
        }

        let keys = store
            .keys()
            .into_iter()
            .map(|key| ResponseValue::BulkString(Some(key)))
            .collect();
        CommandResult::Ok(ResponseValue::Array(keys))
    }

    fn name(&self) -> &'static str {
        "KEYS"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Range(1, 2)
    }
}

/// TYPE command - "string", "list", "hash", or "none"
pub struct TypeCommand;

#[async_trait]
impl Command for TypeCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        let type_name = store.key_type(&args[0]);
        CommandResult::Ok(ResponseValue::SimpleString(type_name.to_string()))
    }

    fn name(&self) -> &'static str {
        "TYPE"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

/// RENAME command - move a key, carrying its expiry along
pub struct RenameCommand;

#[async_trait]
impl Command for RenameCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        if store.rename(&args[0], &args[1]) {
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        } else {
            CommandResult::Error("ERR no such key".to_string())
        }
    }

    fn name(&self) -> &'static str {
        "RENAME"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn del_counts_removed_keys() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());

        let result = DelCommand.execute(&args(&["a", "b", "ghost"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Integer(2)));
    }

    #[tokio::test]
    async fn flushall_empties_the_store() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string());
        store.rpush("l", "x".to_string()).unwrap();

        let result = FlushAllCommand.execute(&[], &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn keys_lists_every_live_key() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string());
        store.hset("h", "f", "v".to_string()).unwrap();

        let result = KeysCommand.execute(&[], &store).await;
        let CommandResult::Ok(ResponseValue::Array(items)) = result else {
            panic!("expected array reply");
        };
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn keys_star_pattern_is_accepted() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string());

        let result = KeysCommand.execute(&args(&["*"]), &store).await;
        assert!(matches!(
            result,
            CommandResult::Ok(ResponseValue::Array(_))
        ));

        let result = KeysCommand.execute(&args(&["user:*"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn type_reports_each_shape() {
        let store = MemoryStore::new();
        store.set("s", "v".to_string());
        store.rpush("l", "a".to_string()).unwrap();
        store.hset("h", "f", "v".to_string()).unwrap();

        for (key, expected) in [("s", "string"), ("l", "list"), ("h", "hash"), ("x", "none")] {
            let result = TypeCommand.execute(&args(&[key]), &store).await;
            assert_eq!(
                result,
                CommandResult::Ok(ResponseValue::SimpleString(expected.to_string()))
            );
        }
    }

    #[tokio::test]
    async fn rename_moves_the_key() {
        let store = MemoryStore::new();
        store.set("old", "v".to_string());

        let result = RenameCommand.execute(&args(&["old", "new"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );
        assert_eq!(store.get("new").unwrap(), Some("v".to_string()));
        assert_eq!(store.get("old").unwrap(), None);
    }

    #[tokio::test]
    async fn rename_missing_key_is_an_error() {
        let store = MemoryStore::new();
        let result = RenameCommand.execute(&args(&["ghost", "new"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR no such key".to_string())
        );
    }
}
