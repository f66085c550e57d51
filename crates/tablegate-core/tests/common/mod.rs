// crates/tablegate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for pipeline and registry tests.
// Purpose: Provide a recording provider and sample identities.
// Dependencies: tablegate-core
// ============================================================================

//! ## Overview
//! [`RecordingProvider`] answers every call with a canned payload and records
//! the calls it received, so tests can assert that rejected commands never
//! reach the provider.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tablegate_core::AllowList;
use tablegate_core::DataProvider;
use tablegate_core::Identity;
use tablegate_core::OperationRegistry;
use tablegate_core::Pipeline;
use tablegate_core::ProviderError;
use tablegate_core::RecordQuery;
use tablegate_core::RecordUpdate;
use tablegate_core::TableRef;

// ============================================================================
// SECTION: Recording Provider
// ============================================================================

/// Provider call captured by [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    ListCollections,
    ListSchemaUnits(String),
    DescribeSchemaUnit(TableRef),
    ListRecords(TableRef, RecordQuery),
    GetRecord(TableRef, String),
    CreateRecord(TableRef, Map<String, Value>, bool),
    UpdateRecords(TableRef, Vec<RecordUpdate>, bool),
    DeleteRecords(TableRef, Vec<String>),
}

/// Fake provider returning canned payloads.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<ProviderCall>>,
    response: Mutex<Option<Result<Value, ProviderError>>>,
}

impl RecordingProvider {
    /// Makes every subsequent call return `response`.
    pub fn respond_with(&self, response: Result<Value, ProviderError>) {
        *self.response.lock().unwrap() = Some(response);
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProviderCall) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(call);
        self.response.lock().unwrap().clone().unwrap_or_else(|| Ok(json!({})))
    }
}

#[async_trait]
impl DataProvider for RecordingProvider {
    async fn list_collections(&self) -> Result<Value, ProviderError> {
        self.record(ProviderCall::ListCollections)
    }

    async fn list_schema_units(&self, collection_id: &str) -> Result<Value, ProviderError> {
        self.record(ProviderCall::ListSchemaUnits(collection_id.to_string()))
    }

    async fn describe_schema_unit(&self, table: &TableRef) -> Result<Value, ProviderError> {
        self.record(ProviderCall::DescribeSchemaUnit(table.clone()))
    }

    async fn list_records(
        &self,
        table: &TableRef,
        query: &RecordQuery,
    ) -> Result<Value, ProviderError> {
        self.record(ProviderCall::ListRecords(table.clone(), query.clone()))
    }

    async fn get_record(&self, table: &TableRef, record_id: &str) -> Result<Value, ProviderError> {
        self.record(ProviderCall::GetRecord(table.clone(), record_id.to_string()))
    }

    async fn create_record(
        &self,
        table: &TableRef,
        fields: &Map<String, Value>,
        typecast: bool,
    ) -> Result<Value, ProviderError> {
        self.record(ProviderCall::CreateRecord(table.clone(), fields.clone(), typecast))
    }

    async fn update_records(
        &self,
        table: &TableRef,
        records: &[RecordUpdate],
        typecast: bool,
    ) -> Result<Value, ProviderError> {
        self.record(ProviderCall::UpdateRecords(table.clone(), records.to_vec(), typecast))
    }

    async fn delete_records(
        &self,
        table: &TableRef,
        record_ids: &[String],
    ) -> Result<Value, ProviderError> {
        self.record(ProviderCall::DeleteRecords(table.clone(), record_ids.to_vec()))
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Allow-list granting write access to `bob` only.
pub fn sample_allow_list() -> AllowList {
    AllowList::new(["bob"])
}

/// Identity that is not allow-listed.
pub fn alice() -> Identity {
    Identity::new("alice", "Alice")
}

/// Identity that is allow-listed.
pub fn bob() -> Identity {
    Identity::new("bob", "Bob")
}

/// Registry for an identity against the sample allow-list.
pub fn registry_for(identity: &Identity) -> OperationRegistry {
    OperationRegistry::for_identity(identity, &sample_allow_list())
}

/// Pipeline over a fresh recording provider.
pub fn recording_pipeline() -> (Pipeline, Arc<RecordingProvider>) {
    let provider = Arc::new(RecordingProvider::default());
    (Pipeline::new(provider.clone()), provider)
}

/// Builds `count` update entries.
pub fn update_entries(count: usize) -> Value {
    Value::Array(
        (0 .. count).map(|index| json!({ "id": format!("rec{index}"), "fields": {} })).collect(),
    )
}

/// Builds `count` record ids.
pub fn record_ids(count: usize) -> Value {
    Value::Array((0 .. count).map(|index| json!(format!("rec{index}"))).collect())
}
