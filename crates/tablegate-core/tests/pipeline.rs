// crates/tablegate-core/tests/pipeline.rs
// ============================================================================
// Module: Pipeline Tests
// Description: End-to-end command dispatch against a recording provider.
// Purpose: Verify permission gating, validation short-circuits, and envelopes.
// Dependencies: tablegate-core, tokio
// ============================================================================

//! Pipeline scenarios covering every outcome class.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use serde_json::Value;
use serde_json::json;
use tablegate_core::Command;
use tablegate_core::ErrorKind;
use tablegate_core::OperationName;
use tablegate_core::ProviderError;
use tablegate_core::RecordQuery;
use tablegate_core::TableRef;

use crate::common::ProviderCall;
use crate::common::alice;
use crate::common::bob;
use crate::common::record_ids;
use crate::common::recording_pipeline;
use crate::common::registry_for;
use crate::common::update_entries;

fn table() -> TableRef {
    TableRef {
        collection_id: "app1".to_string(),
        unit_id: "tbl1".to_string(),
    }
}

// ============================================================================
// SECTION: Permission Gating
// ============================================================================

/// A write requested by a read-only identity reads as an unknown tool.
#[tokio::test]
async fn unregistered_write_is_unknown_tool() {
    let (pipeline, provider) = recording_pipeline();
    let report = pipeline
        .dispatch(
            &registry_for(&alice()),
            Command::new(
                "createRecord",
                json!({ "collectionId": "app1", "unitId": "tbl1", "fields": { "Name": "x" } }),
            ),
        )
        .await;
    assert!(!report.envelope.is_ok());
    assert_eq!(report.error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(report.envelope.error_message(), Some("unknown tool: createRecord"));
    assert_eq!(report.operation, None);
    assert!(!report.provider_called);
    assert!(provider.calls().is_empty());
}

/// Unregistered names are rejected even when the arguments are garbage.
#[tokio::test]
async fn unknown_tool_wins_over_invalid_arguments() {
    let (pipeline, provider) = recording_pipeline();
    let report =
        pipeline.dispatch(&registry_for(&alice()), Command::new("deleteRecords", json!(42))).await;
    assert_eq!(report.error_kind(), Some(ErrorKind::NotFound));
    assert!(provider.calls().is_empty());
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Oversized batches are rejected without contacting the provider.
#[tokio::test]
async fn oversized_batch_never_reaches_provider() {
    let (pipeline, provider) = recording_pipeline();
    let report = pipeline
        .dispatch(
            &registry_for(&bob()),
            Command::new(
                "updateRecords",
                json!({ "collectionId": "app1", "unitId": "tbl1", "records": update_entries(11) }),
            ),
        )
        .await;
    assert_eq!(report.error_kind(), Some(ErrorKind::Validation));
    assert_eq!(report.operation, Some(OperationName::UpdateRecords));
    assert!(!report.provider_called);
    assert!(provider.calls().is_empty());
    let message = report.envelope.error_message().unwrap();
    assert!(message.contains("between 1 and 10"), "{message}");
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Successful reads wrap the provider payload unchanged.
#[tokio::test]
async fn list_collections_wraps_payload() {
    let (pipeline, provider) = recording_pipeline();
    let payload = json!({ "bases": [{ "id": "app1", "name": "CRM" }] });
    provider.respond_with(Ok(payload.clone()));
    let report = pipeline
        .dispatch(&registry_for(&alice()), Command::new("listCollections", Value::Null))
        .await;
    assert!(report.envelope.is_ok());
    assert_eq!(report.envelope.payload(), Some(&payload));
    assert_eq!(report.envelope.error_message(), None);
    assert_eq!(report.error_kind(), None);
    assert_eq!(provider.calls(), vec![ProviderCall::ListCollections]);
}

/// Batch deletes pass per-record outcomes through verbatim.
#[tokio::test]
async fn partial_batch_outcome_is_passed_through() {
    let (pipeline, provider) = recording_pipeline();
    let payload = json!({
        "records": [
            { "id": "rec0", "deleted": true },
            { "id": "rec1", "deleted": true },
            { "id": "rec2", "deleted": false },
        ]
    });
    provider.respond_with(Ok(payload.clone()));
    let report = pipeline
        .dispatch(
            &registry_for(&bob()),
            Command::new(
                "deleteRecords",
                json!({ "collectionId": "app1", "unitId": "tbl1", "recordIds": record_ids(3) }),
            ),
        )
        .await;
    assert!(report.envelope.is_ok());
    assert_eq!(report.envelope.payload(), Some(&payload));
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::DeleteRecords(
            table(),
            vec!["rec0".to_string(), "rec1".to_string(), "rec2".to_string()],
        )]
    );
}

/// Search executes as a single filtered listing.
#[tokio::test]
async fn search_issues_one_listing_call() {
    let (pipeline, provider) = recording_pipeline();
    let report = pipeline
        .dispatch(
            &registry_for(&alice()),
            Command::new(
                "searchRecords",
                json!({ "collectionId": "app1", "unitId": "tbl1", "filter": "{Open}" }),
            ),
        )
        .await;
    assert!(report.envelope.is_ok());
    let expected = RecordQuery {
        filter: Some("{Open}".to_string()),
        ..RecordQuery::default()
    };
    assert_eq!(provider.calls(), vec![ProviderCall::ListRecords(table(), expected)]);
}

/// Provider failures become provider envelopes carrying the upstream message.
#[tokio::test]
async fn provider_failure_becomes_provider_envelope() {
    let (pipeline, provider) = recording_pipeline();
    provider.respond_with(Err(ProviderError::Status {
        status: 404,
        message: "Could not find table tblX".to_string(),
    }));
    let report = pipeline
        .dispatch(
            &registry_for(&alice()),
            Command::new("describeSchemaUnit", json!({ "collectionId": "app1", "unitId": "tblX" })),
        )
        .await;
    assert!(!report.envelope.is_ok());
    assert_eq!(report.envelope.payload(), None);
    assert_eq!(report.error_kind(), Some(ErrorKind::Provider));
    assert!(report.provider_called);
    let message = report.envelope.error_message().unwrap();
    assert!(message.contains("404"), "{message}");
    assert!(message.contains("Could not find table tblX"), "{message}");
}

/// A failed command leaves the pipeline usable for the next one.
#[tokio::test]
async fn failure_does_not_poison_later_commands() {
    let (pipeline, provider) = recording_pipeline();
    let registry = registry_for(&bob());
    provider.respond_with(Err(ProviderError::Transport("connection reset".to_string())));
    let first = pipeline.dispatch(&registry, Command::new("listCollections", json!({}))).await;
    assert!(!first.envelope.is_ok());
    provider.respond_with(Ok(json!({ "bases": [] })));
    let second = pipeline.dispatch(&registry, Command::new("listCollections", json!({}))).await;
    assert!(second.envelope.is_ok());
    assert_eq!(provider.calls().len(), 2);
}
