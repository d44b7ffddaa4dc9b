//! String command implementations (SET, GET)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;

/// SET command: `SET key value [EX seconds | PX milliseconds]`
pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        // Arity is Range(3, 5); a lone option word without its value slips
        // through that check and is rejected here.
        if args.len() == 3 {
            return CommandResult::Error(
                "ERR wrong number of arguments for 'SET' command".to_string(),
            );
        }

        let key = &args[0];
        let value = args[1].clone();

        let ttl_seconds = if args.len() == 4 {
            let option = args[2].to_uppercase();
            let amount = match args[3].parse::<i64>() {
                Ok(amount) if amount > 0 => amount,
                _ => {
                    return CommandResult::Error(
                        "ERR invalid expire time in 'SET' command".to_string(),
                    )
                }
            };
            match option.as_str() {
                "EX" => Some(amount),
                // PX rounds up to whole seconds.
                "PX" => Some((amount + 999) / 1000),
                _ => {
                    return CommandResult::Error(format!("ERR unknown option '{}'", args[2]));
                }
            }
        } else {
            None
        };

        store.set(key, value);
        if let Some(seconds) = ttl_seconds {
            store.expire(key, seconds);
        }
        CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
    }

    fn name(&self) -> &'static str {
        "SET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Range(3, 5)
    }
}

/// GET command
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult {
        match store.get(&args[0]) {
            Ok(Some(value)) => CommandResult::Ok(ResponseValue::BulkString(Some(value))),
            Ok(None) => CommandResult::Ok(ResponseValue::BulkString(None)),
            Err(e) => CommandResult::Error(e.to_client_error()),
        }
    }

    fn name(&self) -> &'static str {
        "GET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();

        let set = SetCommand.execute(&args(&["foo", "bar"]), &store).await;
        assert_eq!(
            set,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );

        let get = GetCommand.execute(&args(&["foo"]), &store).await;
        assert_eq!(
            get,
            CommandResult::Ok(ResponseValue::BulkString(Some("bar".to_string())))
        );
    }

    #[tokio::test]
    async fn get_missing_key_is_nil() {
        let store = MemoryStore::new();
        let get = GetCommand.execute(&args(&["nope"]), &store).await;
        assert_eq!(get, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test]
    async fn get_on_list_key_reports_wrong_type() {
        let store = MemoryStore::new();
        store.rpush("mylist", "a".to_string()).unwrap();

        let get = GetCommand.execute(&args(&["mylist"]), &store).await;
        assert!(matches!(get, CommandResult::Error(msg) if msg.starts_with("ERR")));
    }

    #[tokio::test]
    async fn set_with_ex_schedules_expiry() {
        let store = MemoryStore::new();
        let set = SetCommand
            .execute(&args(&["x", "1", "EX", "100"]), &store)
            .await;
        assert!(matches!(set, CommandResult::Ok(_)));

        let ttl = store.ttl("x");
        assert!(ttl > 0 && ttl <= 100, "got {ttl}");
    }

    #[tokio::test]
    async fn set_with_px_rounds_up_to_seconds() {
        let store = MemoryStore::new();
        SetCommand
            .execute(&args(&["x", "1", "PX", "1500"]), &store)
            .await;
        // 1500 ms rounds up to 2 s.
        let ttl = store.ttl("x");
        assert!(ttl >= 1 && ttl <= 2, "got {ttl}");
    }

    #[tokio::test]
    async fn set_with_tiny_px_still_expires() {
        let store = MemoryStore::new();
        SetCommand
            .execute(&args(&["x", "1", "px", "1000"]), &store)
            .await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get("x").unwrap(), None);
    }

    #[tokio::test]
    async fn set_rejects_unknown_option() {
        let store = MemoryStore::new();
        let result = SetCommand
            .execute(&args(&["x", "1", "NX", "1"]), &store)
            .await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn set_rejects_non_numeric_expiry() {
        let store = MemoryStore::new();
        let result = SetCommand
            .execute(&args(&["x", "1", "EX", "soon"]), &store)
            .await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn set_rejects_dangling_option_word() {
        let store = MemoryStore::new();
        let result = SetCommand.execute(&args(&["x", "1", "EX"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn set_overwrites_and_clears_ttl() {
        let store = MemoryStore::new();
        SetCommand
            .execute(&args(&["x", "1", "EX", "100"]), &store)
            .await;
        SetCommand.execute(&args(&["x", "2"]), &store).await;
        assert_eq!(store.ttl("x"), -1);
        assert_eq!(store.get("x").unwrap(), Some("2".to_string()));
    }
}
