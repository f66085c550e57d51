// crates/tablegate-core/src/operation.rs
// ============================================================================
// Module: Operation Catalog
// Description: Canonical tool names, classifications, and input schemas.
// Purpose: Single source of truth for the gateway command vocabulary.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every command the gateway understands is an [`OperationName`]. Each name
//! carries a fixed [`Classification`] (read or write), a description, and a
//! JSON Schema describing its arguments. [`OperationDescriptor`] bundles these
//! for registration into a session's [`crate::OperationRegistry`].
//!
//! ## Invariants
//! - Wire names are stable and unique.
//! - Classification is a property of the name, never of the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::envelope::GatewayError;
use crate::validation::MAX_BATCH_SIZE;
use crate::validation::MAX_PROJECTED_FIELDS;
use crate::validation::MAX_RECORDS_PER_REQUEST;
use crate::validation::ValidatedCommand;
use crate::validation::validate_arguments;

/// Schema pattern requiring at least one non-whitespace character.
const NON_BLANK_PATTERN: &str = "\\S";

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Side-effect classification for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Read-only operation, available to every authenticated identity.
    Read,
    /// Mutating operation, available only to allow-listed identities.
    Write,
}

impl Classification {
    /// Returns a stable label for the classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

// ============================================================================
// SECTION: Operation Names
// ============================================================================

/// Tool names exposed over both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationName {
    /// List the collections (bases) visible to the provider credential.
    ListCollections,
    /// List the schema units (tables) of one collection.
    ListSchemaUnits,
    /// Describe one schema unit.
    DescribeSchemaUnit,
    /// List records with optional view, filter, sort, and paging.
    ListRecords,
    /// Fetch one record by id.
    GetRecord,
    /// List records matching a mandatory filter formula.
    SearchRecords,
    /// Create one record.
    CreateRecord,
    /// Update a batch of records.
    UpdateRecords,
    /// Delete a batch of records.
    DeleteRecords,
}

impl OperationName {
    /// Returns the canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListCollections => "listCollections",
            Self::ListSchemaUnits => "listSchemaUnits",
            Self::DescribeSchemaUnit => "describeSchemaUnit",
            Self::ListRecords => "listRecords",
            Self::GetRecord => "getRecord",
            Self::SearchRecords => "searchRecords",
            Self::CreateRecord => "createRecord",
            Self::UpdateRecords => "updateRecords",
            Self::DeleteRecords => "deleteRecords",
        }
    }

    /// Returns every operation in canonical catalog order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ListCollections,
            Self::ListSchemaUnits,
            Self::DescribeSchemaUnit,
            Self::ListRecords,
            Self::GetRecord,
            Self::SearchRecords,
            Self::CreateRecord,
            Self::UpdateRecords,
            Self::DeleteRecords,
        ]
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|operation| operation.as_str() == name)
    }

    /// Returns the fixed classification for the operation.
    #[must_use]
    pub const fn classification(self) -> Classification {
        match self {
            Self::ListCollections
            | Self::ListSchemaUnits
            | Self::DescribeSchemaUnit
            | Self::ListRecords
            | Self::GetRecord
            | Self::SearchRecords => Classification::Read,
            Self::CreateRecord | Self::UpdateRecords | Self::DeleteRecords => {
                Classification::Write
            }
        }
    }

    /// Returns the human-readable tool description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ListCollections => "List all collections (bases) the gateway can access.",
            Self::ListSchemaUnits => {
                "List the schema units (tables) of a collection, including fields and views."
            }
            Self::DescribeSchemaUnit => "Describe one schema unit (table) by id or name.",
            Self::ListRecords => {
                "List records of a table with optional view, filter formula, sort, and paging."
            }
            Self::GetRecord => "Fetch a single record by id.",
            Self::SearchRecords => "Search records of a table using a filter formula.",
            Self::CreateRecord => "Create a record from a map of field values.",
            Self::UpdateRecords => "Update between 1 and 10 records in one batch.",
            Self::DeleteRecords => "Delete between 1 and 10 records in one batch.",
        }
    }

    /// Returns the JSON Schema for the operation's arguments.
    #[must_use]
    pub fn input_schema(self) -> Value {
        let id = json!({ "type": "string", "minLength": 1, "pattern": NON_BLANK_PATTERN });
        let max_records = json!({
            "type": "integer",
            "minimum": 1,
            "maximum": MAX_RECORDS_PER_REQUEST,
        });
        let sort = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "field": id,
                    "direction": { "type": "string", "enum": ["asc", "desc"] },
                },
                "required": ["field"],
                "additionalProperties": false,
            },
        });
        let fields = json!({ "type": "object" });
        let typecast = json!({ "type": "boolean" });
        match self {
            Self::ListCollections => object_schema(json!({}), &[]),
            Self::ListSchemaUnits => {
                object_schema(json!({ "collectionId": id }), &["collectionId"])
            }
            Self::DescribeSchemaUnit => object_schema(
                json!({ "collectionId": id, "unitId": id }),
                &["collectionId", "unitId"],
            ),
            Self::ListRecords => object_schema(
                json!({
                    "collectionId": id,
                    "unitId": id,
                    "view": id,
                    "maxRecords": max_records,
                    "sort": sort,
                    "filter": { "type": "string" },
                    "offset": id,
                    "fields": {
                        "type": "array",
                        "items": id,
                        "maxItems": MAX_PROJECTED_FIELDS,
                    },
                }),
                &["collectionId", "unitId"],
            ),
            Self::GetRecord => object_schema(
                json!({ "collectionId": id, "unitId": id, "recordId": id }),
                &["collectionId", "unitId", "recordId"],
            ),
            Self::SearchRecords => object_schema(
                json!({
                    "collectionId": id,
                    "unitId": id,
                    "filter": id,
                    "maxRecords": max_records,
                    "sort": sort,
                }),
                &["collectionId", "unitId", "filter"],
            ),
            Self::CreateRecord => object_schema(
                json!({
                    "collectionId": id,
                    "unitId": id,
                    "fields": fields,
                    "typecast": typecast,
                }),
                &["collectionId", "unitId", "fields"],
            ),
            Self::UpdateRecords => object_schema(
                json!({
                    "collectionId": id,
                    "unitId": id,
                    "records": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": MAX_BATCH_SIZE,
                        "items": {
                            "type": "object",
                            "properties": { "id": id, "fields": fields },
                            "required": ["id", "fields"],
                            "additionalProperties": false,
                        },
                    },
                    "typecast": typecast,
                }),
                &["collectionId", "unitId", "records"],
            ),
            Self::DeleteRecords => object_schema(
                json!({
                    "collectionId": id,
                    "unitId": id,
                    "recordIds": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": MAX_BATCH_SIZE,
                        "items": id,
                    },
                }),
                &["collectionId", "unitId", "recordIds"],
            ),
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Registered operation: name, classification, and argument schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Operation name.
    pub name: OperationName,
    /// Side-effect classification.
    pub classification: Classification,
    /// Tool description published in listings.
    pub description: &'static str,
    /// JSON Schema for the arguments.
    pub input_schema: Value,
}

impl OperationDescriptor {
    /// Builds the descriptor for an operation.
    #[must_use]
    pub fn for_operation(name: OperationName) -> Self {
        Self {
            name,
            classification: name.classification(),
            description: name.description(),
            input_schema: name.input_schema(),
        }
    }

    /// Validates raw arguments into a typed command for this operation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when arguments are malformed.
    pub fn validate(&self, raw: Value) -> Result<ValidatedCommand, GatewayError> {
        validate_arguments(self.name, raw)
    }
}

/// Wraps property schemas in a closed object schema.
fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
