// crates/tablegate-core/src/provider.rs
// ============================================================================
// Module: Data Provider Interface
// Description: Async interface to the external tabular-data service.
// Purpose: Decouple the pipeline from the concrete REST adapter.
// Dependencies: async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`DataProvider`] has one method per logical operation. Implementations
//! issue exactly one upstream request per call and return the upstream JSON
//! unmodified, including per-entry outcomes of batch writes. Failures are
//! reported once through [`ProviderError`]; nothing here retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Addresses one schema unit (table) inside a collection (base).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    /// Collection identifier.
    pub collection_id: String,
    /// Schema unit identifier or name.
    pub unit_id: String,
}

/// Sort direction for record listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Returns the provider query value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field name to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Options for listing or searching records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// View name or id.
    pub view: Option<String>,
    /// Maximum number of records (1..=100).
    pub max_records: Option<u32>,
    /// Ordered sort keys.
    pub sort: Vec<SortSpec>,
    /// Filter formula.
    pub filter: Option<String>,
    /// Paging cursor returned by a previous listing.
    pub offset: Option<String>,
    /// Field projection.
    pub fields: Vec<String>,
}

/// One entry of a batch update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    /// Record identifier.
    pub id: String,
    /// Field values to write.
    pub fields: Map<String, Value>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Upstream returned a non-success status.
    #[error("provider error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Bounded excerpt of the upstream error.
        message: String,
    },
    /// Request could not be sent or the response could not be read.
    #[error("provider request failed: {0}")]
    Transport(String),
    /// Response body was not the expected JSON.
    #[error("provider response invalid: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Returns the upstream status when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status {
                status, ..
            } => Some(*status),
            Self::Transport(_) | Self::InvalidResponse(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// External tabular-data service.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Lists collections.
    async fn list_collections(&self) -> Result<Value, ProviderError>;

    /// Lists the schema units of a collection.
    async fn list_schema_units(&self, collection_id: &str) -> Result<Value, ProviderError>;

    /// Describes one schema unit.
    async fn describe_schema_unit(&self, table: &TableRef) -> Result<Value, ProviderError>;

    /// Lists records of a schema unit.
    async fn list_records(
        &self,
        table: &TableRef,
        query: &RecordQuery,
    ) -> Result<Value, ProviderError>;

    /// Fetches one record.
    async fn get_record(&self, table: &TableRef, record_id: &str) -> Result<Value, ProviderError>;

    /// Creates one record.
    async fn create_record(
        &self,
        table: &TableRef,
        fields: &Map<String, Value>,
        typecast: bool,
    ) -> Result<Value, ProviderError>;

    /// Updates a batch of records in one request.
    async fn update_records(
        &self,
        table: &TableRef,
        records: &[RecordUpdate],
        typecast: bool,
    ) -> Result<Value, ProviderError>;

    /// Deletes a batch of records in one request.
    async fn delete_records(
        &self,
        table: &TableRef,
        record_ids: &[String],
    ) -> Result<Value, ProviderError>;
}
