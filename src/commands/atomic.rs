//! Atomic numeric commands (INCR)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;

/// INCR command - increment the integer stored at key, creating it at 0
pub struct IncrCommand;

#[async_trait]
impl Command for IncrCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        match store.incr(&args[0]) {
            Ok(new_value) => CommandResult::Ok(ResponseValue::Integer(new_value)),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "INCR"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_missing_key_yields_one() {
        let store = MemoryStore::new();
        let result = IncrCommand.execute(&["n".to_string()], &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Integer(1)));
    }

    #[tokio::test]
    async fn incr_numeric_string_yields_next_value() {
        let store = MemoryStore::new();
        store.set("n", "42".to_string());
        let result = IncrCommand.execute(&["n".to_string()], &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Integer(43)));
    }

    #[tokio::test]
    async fn incr_non_numeric_string_errors_without_modifying() {
        let store = MemoryStore::new();
        store.set("n", "xx".to_string());

        let result = IncrCommand.execute(&["n".to_string()], &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR value is not an integer or out of range".to_string())
        );
        assert_eq!(store.get("n").unwrap(), Some("xx".to_string()));
    }

    #[tokio::test]
    async fn incr_on_hash_key_is_wrong_type() {
        let store = MemoryStore::new();
        store.hset("h", "f", "v".to_string()).unwrap();
        let result = IncrCommand.execute(&["h".to_string()], &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }
}
