// crates/tablegate-core/src/validation.rs
// ============================================================================
// Module: Argument Validation
// Description: Decode and bound-check raw tool arguments.
// Purpose: Reject malformed input before any provider request is issued.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`validate_arguments`] turns the raw JSON arguments of a command into a
//! [`ValidatedCommand`]. Decoding is strict (unknown keys are rejected) and
//! bounds are checked explicitly: identifiers must be non-empty, record limits
//! lie in `1..=100`, and batch writes carry between 1 and 10 entries. Field
//! maps are passed through opaquely; the provider is authoritative on typing.
//! Security posture: arguments are untrusted caller input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::envelope::GatewayError;
use crate::operation::OperationName;
use crate::provider::DataProvider;
use crate::provider::ProviderError;
use crate::provider::RecordQuery;
use crate::provider::RecordUpdate;
use crate::provider::SortDirection;
use crate::provider::SortSpec;
use crate::provider::TableRef;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum records returned by one listing or search.
pub const MAX_RECORDS_PER_REQUEST: u32 = 100;
/// Maximum entries in one batch update or delete.
pub const MAX_BATCH_SIZE: usize = 10;
/// Maximum field names in a listing projection.
pub const MAX_PROJECTED_FIELDS: usize = 100;

// ============================================================================
// SECTION: Validated Commands
// ============================================================================

/// A command whose arguments passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedCommand {
    /// List collections.
    ListCollections,
    /// List schema units of a collection.
    ListSchemaUnits {
        /// Collection identifier.
        collection_id: String,
    },
    /// Describe one schema unit.
    DescribeSchemaUnit {
        /// Target table.
        table: TableRef,
    },
    /// List records.
    ListRecords {
        /// Target table.
        table: TableRef,
        /// Listing options.
        query: RecordQuery,
    },
    /// Fetch one record.
    GetRecord {
        /// Target table.
        table: TableRef,
        /// Record identifier.
        record_id: String,
    },
    /// Search records with a mandatory filter.
    SearchRecords {
        /// Target table.
        table: TableRef,
        /// Listing options; `filter` is always set.
        query: RecordQuery,
    },
    /// Create one record.
    CreateRecord {
        /// Target table.
        table: TableRef,
        /// Field values.
        fields: Map<String, Value>,
        /// Let the provider coerce field values.
        typecast: bool,
    },
    /// Update 1..=10 records.
    UpdateRecords {
        /// Target table.
        table: TableRef,
        /// Batch entries in caller order.
        records: Vec<RecordUpdate>,
        /// Let the provider coerce field values.
        typecast: bool,
    },
    /// Delete 1..=10 records.
    DeleteRecords {
        /// Target table.
        table: TableRef,
        /// Record identifiers in caller order.
        record_ids: Vec<String>,
    },
}

impl ValidatedCommand {
    /// Returns the operation this command belongs to.
    #[must_use]
    pub const fn operation(&self) -> OperationName {
        match self {
            Self::ListCollections => OperationName::ListCollections,
            Self::ListSchemaUnits {
                ..
            } => OperationName::ListSchemaUnits,
            Self::DescribeSchemaUnit {
                ..
            } => OperationName::DescribeSchemaUnit,
            Self::ListRecords {
                ..
            } => OperationName::ListRecords,
            Self::GetRecord {
                ..
            } => OperationName::GetRecord,
            Self::SearchRecords {
                ..
            } => OperationName::SearchRecords,
            Self::CreateRecord {
                ..
            } => OperationName::CreateRecord,
            Self::UpdateRecords {
                ..
            } => OperationName::UpdateRecords,
            Self::DeleteRecords {
                ..
            } => OperationName::DeleteRecords,
        }
    }

    /// Executes the command with exactly one provider call.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider call fails.
    pub async fn execute(&self, provider: &dyn DataProvider) -> Result<Value, ProviderError> {
        match self {
            Self::ListCollections => provider.list_collections().await,
            Self::ListSchemaUnits {
                collection_id,
            } => provider.list_schema_units(collection_id).await,
            Self::DescribeSchemaUnit {
                table,
            } => provider.describe_schema_unit(table).await,
            Self::ListRecords {
                table,
                query,
            }
            | Self::SearchRecords {
                table,
                query,
            } => provider.list_records(table, query).await,
            Self::GetRecord {
                table,
                record_id,
            } => provider.get_record(table, record_id).await,
            Self::CreateRecord {
                table,
                fields,
                typecast,
            } => provider.create_record(table, fields, *typecast).await,
            Self::UpdateRecords {
                table,
                records,
                typecast,
            } => provider.update_records(table, records, *typecast).await,
            Self::DeleteRecords {
                table,
                record_ids,
            } => provider.delete_records(table, record_ids).await,
        }
    }
}

// ============================================================================
// SECTION: Raw Argument Shapes
// ============================================================================

/// Arguments for operations without parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

/// Arguments addressing a collection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CollectionArgs {
    /// Collection identifier.
    collection_id: String,
}

/// Arguments addressing a schema unit.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct TableArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
}

/// Arguments addressing one record.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RecordArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// Record identifier.
    record_id: String,
}

/// Sort key as supplied by the caller.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SortArg {
    /// Field name.
    field: String,
    /// Direction, ascending when omitted.
    #[serde(default)]
    direction: SortDirection,
}

/// Arguments for `listRecords`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ListRecordsArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// View name or id.
    view: Option<String>,
    /// Record limit.
    max_records: Option<i64>,
    /// Sort keys.
    sort: Option<Vec<SortArg>>,
    /// Filter formula.
    filter: Option<String>,
    /// Paging cursor.
    offset: Option<String>,
    /// Field projection.
    fields: Option<Vec<String>>,
}

/// Arguments for `searchRecords`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SearchRecordsArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// Filter formula.
    filter: String,
    /// Record limit.
    max_records: Option<i64>,
    /// Sort keys.
    sort: Option<Vec<SortArg>>,
}

/// Arguments for `createRecord`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CreateRecordArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// Field values.
    fields: Map<String, Value>,
    /// Provider-side coercion.
    #[serde(default)]
    typecast: bool,
}

/// One batch update entry as supplied by the caller.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateEntryArg {
    /// Record identifier.
    id: String,
    /// Field values.
    fields: Map<String, Value>,
}

/// Arguments for `updateRecords`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct UpdateRecordsArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// Batch entries.
    records: Vec<UpdateEntryArg>,
    /// Provider-side coercion.
    #[serde(default)]
    typecast: bool,
}

/// Arguments for `deleteRecords`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DeleteRecordsArgs {
    /// Collection identifier.
    collection_id: String,
    /// Schema unit identifier.
    unit_id: String,
    /// Record identifiers.
    record_ids: Vec<String>,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates raw arguments for an operation.
///
/// Missing or `null` arguments are treated as an empty object.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when arguments are malformed or out of
/// bounds.
pub fn validate_arguments(
    operation: OperationName,
    raw: Value,
) -> Result<ValidatedCommand, GatewayError> {
    match operation {
        OperationName::ListCollections => {
            let NoArgs {} = decode(raw)?;
            Ok(ValidatedCommand::ListCollections)
        }
        OperationName::ListSchemaUnits => {
            let args: CollectionArgs = decode(raw)?;
            require_id("collectionId", &args.collection_id)?;
            Ok(ValidatedCommand::ListSchemaUnits {
                collection_id: args.collection_id,
            })
        }
        OperationName::DescribeSchemaUnit => {
            let args: TableArgs = decode(raw)?;
            Ok(ValidatedCommand::DescribeSchemaUnit {
                table: table_ref(args.collection_id, args.unit_id)?,
            })
        }
        OperationName::ListRecords => {
            let args: ListRecordsArgs = decode(raw)?;
            let table = table_ref(args.collection_id, args.unit_id)?;
            let query = RecordQuery {
                view: optional_id("view", args.view)?,
                max_records: normalize_max_records(args.max_records)?,
                sort: normalize_sort(args.sort)?,
                filter: args.filter.filter(|formula| !formula.trim().is_empty()),
                offset: optional_id("offset", args.offset)?,
                fields: normalize_projection(args.fields)?,
            };
            Ok(ValidatedCommand::ListRecords {
                table,
                query,
            })
        }
        OperationName::GetRecord => {
            let args: RecordArgs = decode(raw)?;
            let table = table_ref(args.collection_id, args.unit_id)?;
            require_id("recordId", &args.record_id)?;
            Ok(ValidatedCommand::GetRecord {
                table,
                record_id: args.record_id,
            })
        }
        OperationName::SearchRecords => {
            let args: SearchRecordsArgs = decode(raw)?;
            let table = table_ref(args.collection_id, args.unit_id)?;
            if args.filter.trim().is_empty() {
                return Err(invalid("filter must be a non-empty formula"));
            }
            let query = RecordQuery {
                max_records: normalize_max_records(args.max_records)?,
                sort: normalize_sort(args.sort)?,
                filter: Some(args.filter),
                ..RecordQuery::default()
            };
            Ok(ValidatedCommand::SearchRecords {
                table,
                query,
            })
        }
        OperationName::CreateRecord => {
            let args: CreateRecordArgs = decode(raw)?;
            Ok(ValidatedCommand::CreateRecord {
                table: table_ref(args.collection_id, args.unit_id)?,
                fields: args.fields,
                typecast: args.typecast,
            })
        }
        OperationName::UpdateRecords => {
            let args: UpdateRecordsArgs = decode(raw)?;
            let table = table_ref(args.collection_id, args.unit_id)?;
            check_batch_size("records", args.records.len())?;
            let mut records = Vec::with_capacity(args.records.len());
            for (index, entry) in args.records.into_iter().enumerate() {
                require_id(&format!("records[{index}].id"), &entry.id)?;
                records.push(RecordUpdate {
                    id: entry.id,
                    fields: entry.fields,
                });
            }
            Ok(ValidatedCommand::UpdateRecords {
                table,
                records,
                typecast: args.typecast,
            })
        }
        OperationName::DeleteRecords => {
            let args: DeleteRecordsArgs = decode(raw)?;
            let table = table_ref(args.collection_id, args.unit_id)?;
            check_batch_size("recordIds", args.record_ids.len())?;
            for (index, id) in args.record_ids.iter().enumerate() {
                require_id(&format!("recordIds[{index}]"), id)?;
            }
            Ok(ValidatedCommand::DeleteRecords {
                table,
                record_ids: args.record_ids,
            })
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a validation error.
fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::Validation(message.into())
}

/// Decodes an argument object into a typed shape.
fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, GatewayError> {
    let object = match raw {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => raw,
        _ => return Err(invalid("arguments must be a JSON object")),
    };
    serde_json::from_value(object).map_err(|err| invalid(err.to_string()))
}

/// Rejects empty or whitespace-only identifiers.
fn require_id(field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must be a non-empty string")));
    }
    Ok(())
}

/// Validates an optional identifier-like string.
fn optional_id(field: &str, value: Option<String>) -> Result<Option<String>, GatewayError> {
    if let Some(value) = &value {
        require_id(field, value)?;
    }
    Ok(value)
}

/// Validates and builds a table reference.
fn table_ref(collection_id: String, unit_id: String) -> Result<TableRef, GatewayError> {
    require_id("collectionId", &collection_id)?;
    require_id("unitId", &unit_id)?;
    Ok(TableRef {
        collection_id,
        unit_id,
    })
}

/// Checks an optional record limit against `1..=MAX_RECORDS_PER_REQUEST`.
fn normalize_max_records(value: Option<i64>) -> Result<Option<u32>, GatewayError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value < 1 || value > i64::from(MAX_RECORDS_PER_REQUEST) {
        return Err(invalid(format!(
            "maxRecords must be between 1 and {MAX_RECORDS_PER_REQUEST}"
        )));
    }
    u32::try_from(value).map(Some).map_err(|_| invalid("maxRecords out of range"))
}

/// Converts caller sort keys into provider sort specs.
fn normalize_sort(sort: Option<Vec<SortArg>>) -> Result<Vec<SortSpec>, GatewayError> {
    let sort = sort.unwrap_or_default();
    let mut specs = Vec::with_capacity(sort.len());
    for (index, entry) in sort.into_iter().enumerate() {
        require_id(&format!("sort[{index}].field"), &entry.field)?;
        specs.push(SortSpec {
            field: entry.field,
            direction: entry.direction,
        });
    }
    Ok(specs)
}

/// Validates a field projection list.
fn normalize_projection(fields: Option<Vec<String>>) -> Result<Vec<String>, GatewayError> {
    let fields = fields.unwrap_or_default();
    if fields.len() > MAX_PROJECTED_FIELDS {
        return Err(invalid(format!("fields must list at most {MAX_PROJECTED_FIELDS} names")));
    }
    for (index, field) in fields.iter().enumerate() {
        require_id(&format!("fields[{index}]"), field)?;
    }
    Ok(fields)
}

/// Checks a batch length against `1..=MAX_BATCH_SIZE`.
fn check_batch_size(field: &str, len: usize) -> Result<(), GatewayError> {
    if len == 0 || len > MAX_BATCH_SIZE {
        return Err(invalid(format!(
            "{field} must contain between 1 and {MAX_BATCH_SIZE} entries, got {len}"
        )));
    }
    Ok(())
}
