// crates/tablegate-core/src/pipeline.rs
// ============================================================================
// Module: Command Pipeline
// Description: Permission check, validation, execution, and envelope building.
// Purpose: One transport-agnostic path for every inbound command.
// Dependencies: crate::{access, envelope, provider, validation}
// ============================================================================

//! ## Overview
//! [`Pipeline::dispatch`] runs a [`Command`] against a session's
//! [`OperationRegistry`]:
//!
//! 1. the registry lookup is the sole authorization checkpoint; unregistered
//!    names fail as "unknown tool" and never reach validation;
//! 2. arguments are validated; failures never reach the provider;
//! 3. the validated command issues exactly one provider call;
//! 4. the outcome becomes an [`Envelope`].
//!
//! Failures terminate only the command that produced them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::access::OperationRegistry;
use crate::envelope::Envelope;
use crate::envelope::ErrorKind;
use crate::envelope::GatewayError;
use crate::operation::OperationName;
use crate::provider::DataProvider;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One inbound tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Requested operation wire name.
    pub operation: String,
    /// Raw JSON arguments.
    pub arguments: Value,
}

impl Command {
    /// Creates a command.
    #[must_use]
    pub fn new(operation: impl Into<String>, arguments: Value) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }
}

/// Envelope plus metadata used for auditing.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    /// Resulting envelope.
    pub envelope: Envelope,
    /// Resolved operation when the name was registered.
    pub operation: Option<OperationName>,
    /// Whether the provider was contacted.
    pub provider_called: bool,
}

impl CommandReport {
    /// Returns the error kind for failed commands.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        self.envelope.error_kind()
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Transport-agnostic command pipeline.
#[derive(Clone)]
pub struct Pipeline {
    /// Provider used to execute validated commands.
    provider: Arc<dyn DataProvider>,
}

impl Pipeline {
    /// Creates a pipeline over a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self {
            provider,
        }
    }

    /// Runs a command through permission, validation, and execution.
    pub async fn dispatch(&self, registry: &OperationRegistry, command: Command) -> CommandReport {
        let Some(descriptor) = registry.get(&command.operation) else {
            return CommandReport {
                envelope: Envelope::from_failure(&GatewayError::NotFound(command.operation)),
                operation: None,
                provider_called: false,
            };
        };
        let operation = descriptor.name;
        let validated = match descriptor.validate(command.arguments) {
            Ok(validated) => validated,
            Err(error) => {
                return CommandReport {
                    envelope: Envelope::from_failure(&error),
                    operation: Some(operation),
                    provider_called: false,
                };
            }
        };
        let result = validated.execute(self.provider.as_ref()).await.map_err(GatewayError::from);
        CommandReport {
            envelope: Envelope::from(result),
            operation: Some(operation),
            provider_called: true,
        }
    }
}
