//! Record validation against a stream's JSON schema (draft 4).

use std::fmt;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// A compiled stream schema.
pub struct SchemaValidator {
    compiled: JSONSchema,
}

impl SchemaValidator {
    /// Compiles `schema`. The error is the compiler's message.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(schema)
            .map_err(|e| e.to_string())?;
        Ok(Self { compiled })
    }

    /// Validates `instance`, joining every violation into one message.
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        if let Err(errors) = self.compiled.validate(instance) {
            let messages = errors
                .map(|e| {
                    let ptr = e.instance_path.to_string();
                    if ptr.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", ptr, e)
                    }
                })
                .collect::<Vec<_>>();
            return Err(messages.join("; "));
        }
        Ok(())
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}
