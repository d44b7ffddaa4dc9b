//! Command registry and execution framework

use crate::commands::{CommandArity, ResponseValue};
use crate::storage::MemoryStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Trait for command implementations
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command with the given arguments (command name removed).
    async fn execute(&self, args: &[String], store: &MemoryStore) -> CommandResult;

    /// Canonical command name.
    fn name(&self) -> &'static str;

    /// Arity over all tokens including the command name.
    fn arity(&self) -> CommandArity;

    /// Additional names the command answers to (e.g. UNLINK for DEL).
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Command execution result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok(ResponseValue),
    Error(String),
}

impl CommandResult {
    /// Collapse into the reply value the codec encodes.
    pub fn into_response(self) -> ResponseValue {
        match self {
            CommandResult::Ok(value) => value,
            CommandResult::Error(message) => ResponseValue::Error(message),
        }
    }
}

/// One decoded request: uppercased command name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Build from the token list the frame parser produced. `None` when the
    /// frame held no tokens.
    pub fn from_tokens(mut tokens: Vec<String>) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        let name = tokens.remove(0).to_uppercase();
        Some(Self { name, args: tokens })
    }

    /// Total token count, command name included.
    pub fn total_tokens(&self) -> usize {
        self.args.len() + 1
    }

    fn arity_matches(&self, arity: &CommandArity) -> bool {
        let total = self.total_tokens();
        match arity {
            CommandArity::Fixed(expected) => total == *expected,
            CommandArity::Range(min, max) => (*min..=*max).contains(&total),
            CommandArity::AtLeast(min) => total >= *min,
        }
    }
}

/// Lookup table from command name to implementation.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// A registry with every command the server speaks.
    pub fn with_default_commands() -> Self {
        use crate::commands::*;

        let mut registry = Self::new();
        registry.register(Arc::new(PingCommand));
        registry.register(Arc::new(EchoCommand));

        registry.register(Arc::new(SetCommand));
        registry.register(Arc::new(GetCommand));
        registry.register(Arc::new(IncrCommand));

        registry.register(Arc::new(DelCommand));
        registry.register(Arc::new(FlushAllCommand));
        registry.register(Arc::new(KeysCommand));
        registry.register(Arc::new(TypeCommand));
        registry.register(Arc::new(RenameCommand));
        registry.register(Arc::new(ExpireCommand));
        registry.register(Arc::new(TtlCommand));

        registry.register(Arc::new(LPushCommand));
        registry.register(Arc::new(RPushCommand));
        registry.register(Arc::new(LPopCommand));
        registry.register(Arc::new(RPopCommand));
        registry.register(Arc::new(LLenCommand));
        registry.register(Arc::new(LRangeCommand));
        registry.register(Arc::new(LRemCommand));
        registry.register(Arc::new(LIndexCommand));
        registry.register(Arc::new(LSetCommand));
        registry.register(Arc::new(LGetCommand));

        registry.register(Arc::new(HSetCommand));
        registry.register(Arc::new(HGetCommand));
        registry.register(Arc::new(HExistsCommand));
        registry.register(Arc::new(HDelCommand));
        registry.register(Arc::new(HGetAllCommand));
        registry.register(Arc::new(HKeysCommand));
        registry.register(Arc::new(HValsCommand));
        registry.register(Arc::new(HLenCommand));
        registry.register(Arc::new(HMSetCommand));

        registry
    }

    /// Register a command under its name and every alias.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        for alias in command.aliases() {
            self.commands
                .insert(alias.to_uppercase(), Arc::clone(&command));
        }
        self.commands
            .insert(command.name().to_uppercase(), command);
    }

    /// Validate and execute one parsed command.
    pub async fn execute(&self, cmd: &ParsedCommand, store: &MemoryStore) -> CommandResult {
        match self.commands.get(&cmd.name) {
            Some(command) => {
                if !cmd.arity_matches(&command.arity()) {
                    return CommandResult::Error(format!(
                        "ERR wrong number of arguments for '{}' command",
                        cmd.name
                    ));
                }
                command.execute(&cmd.args, store).await
            }
            None => {
                warn!(command = %cmd.name, "unknown command");
                CommandResult::Error(format!("ERR unknown command '{}'", cmd.name))
            }
        }
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
