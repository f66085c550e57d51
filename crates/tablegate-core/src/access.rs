// crates/tablegate-core/src/access.rs
// ============================================================================
// Module: Access Control
// Description: Write allow-list and per-identity operation registry.
// Purpose: Resolve the callable operation set once, at session establishment.
// Dependencies: crate::{identity, operation}
// ============================================================================

//! ## Overview
//! Authorization happens when a session is established, not when a command
//! runs. [`OperationRegistry::for_identity`] is a pure function of the caller
//! identity and the [`AllowList`]; the resulting snapshot is the only thing
//! consulted afterwards. Operations left out of the snapshot are
//! indistinguishable from names that do not exist.
//!
//! ## Invariants
//! - A write operation is registered iff the identity id is allow-listed.
//! - Read operations are registered for every identity.
//! - An empty allow-list is valid and grants no write access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::identity::Identity;
use crate::operation::Classification;
use crate::operation::OperationDescriptor;
use crate::operation::OperationName;

// ============================================================================
// SECTION: Allow-List
// ============================================================================

/// Identity ids permitted to run write operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    /// Allow-listed identity ids.
    ids: BTreeSet<String>,
}

impl AllowList {
    /// Builds an allow-list from identity ids.
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when the identity may run write operations.
    #[must_use]
    pub fn permits_writes(&self, identity: &Identity) -> bool {
        self.ids.contains(identity.id())
    }

    /// Returns the number of allow-listed identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when nobody is allow-listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// SECTION: Operation Registry
// ============================================================================

/// Ordered, name-keyed snapshot of the operations a session may call.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRegistry {
    /// Registered descriptors in catalog order.
    descriptors: Vec<OperationDescriptor>,
}

impl OperationRegistry {
    /// Computes the registry for an identity against the allow-list.
    #[must_use]
    pub fn for_identity(identity: &Identity, allow_list: &AllowList) -> Self {
        let writes = allow_list.permits_writes(identity);
        let descriptors = OperationName::all()
            .iter()
            .copied()
            .filter(|name| writes || name.classification() == Classification::Read)
            .map(OperationDescriptor::for_operation)
            .collect();
        Self {
            descriptors,
        }
    }

    /// Returns true iff the operation name is registered.
    #[must_use]
    pub fn is_permitted(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks up a registered descriptor by wire name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.name.as_str() == name)
    }

    /// Returns registered descriptors in catalog order.
    #[must_use]
    pub fn descriptors(&self) -> &[OperationDescriptor] {
        &self.descriptors
    }

    /// Counts registered descriptors with the given classification.
    #[must_use]
    pub fn count(&self, classification: Classification) -> usize {
        self.descriptors
            .iter()
            .filter(|descriptor| descriptor.classification == classification)
            .count()
    }

    /// Returns the registered operation names in catalog order.
    #[must_use]
    pub fn names(&self) -> Vec<OperationName> {
        self.descriptors.iter().map(|descriptor| descriptor.name).collect()
    }
}
