//! Command batches as they arrive on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{MovingImagesError, MovingImagesResult};

/// A batch as submitted on the wire.
///
/// Commands are kept as raw JSON until dispatch so each one sees the variables and objects
/// left behind by the commands before it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandBatch {
    /// Main command list, run in order.
    #[serde(default)]
    pub commands: Vec<Value>,
    /// Run after the main list on every exit path.
    #[serde(default, rename = "cleanupcommands", skip_serializing_if = "Vec::is_empty")]
    pub cleanup_commands: Vec<Value>,
    /// Appended to the context's variables before the first command.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
    /// Ask `run_batch_shared` to dispatch through the asynchronous path.
    #[serde(default, rename = "runasynchronously")]
    pub run_asynchronously: bool,
}

impl CommandBatch {
    /// Batch running `commands` with no cleanup and no variables.
    pub fn new(commands: Vec<Value>) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    /// Replace the cleanup list.
    pub fn with_cleanup(mut self, cleanup: Vec<Value>) -> Self {
        self.cleanup_commands = cleanup;
        self
    }

    /// Add variable bindings.
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Parse the top-level batch object.
    pub fn from_json(value: &Value) -> MovingImagesResult<Self> {
        if !value.is_object() {
            return Err(MovingImagesError::invalid_command(
                "a command batch must be a JSON dictionary",
            ));
        }
        Ok(Self::deserialize(value)?)
    }

    /// Parse batch text.
    pub fn from_json_str(text: &str) -> MovingImagesResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/batch.rs"]
mod tests;
