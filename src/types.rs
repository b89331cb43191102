//! Operation results exchanged between the dispatcher and the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::Diagnostic;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if removed).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// Top-level attribute differences between prior and planned state.
///
/// Null and absent are the same thing. Output is sorted by path.
pub fn diff_attributes(
    prior: Option<&serde_json::Value>,
    planned: &serde_json::Value,
) -> Vec<AttributeChange> {
    let empty = serde_json::Map::new();
    let before = prior.and_then(|v| v.as_object()).unwrap_or(&empty);
    let after = planned.as_object().unwrap_or(&empty);

    let mut keys: Vec<&String> = before.keys().chain(after.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let b = before.get(key).filter(|v| !v.is_null());
            let a = after.get(key).filter(|v| !v.is_null());
            match (b, a) {
                (None, Some(a)) => Some(AttributeChange::added(key.clone(), a.clone())),
                (Some(b), None) => Some(AttributeChange::removed(key.clone(), b.clone())),
                (Some(b), Some(a)) if a != b => {
                    Some(AttributeChange::modified(key.clone(), b.clone(), a.clone()))
                },
                _ => None,
            }
        })
        .collect()
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Attributes whose change forces replacement. Empty means update in place.
    pub requires_replace: Vec<String>,
    /// Diagnostics raised while planning.
    pub diagnostics: Vec<Diagnostic>,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: Vec<String>,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }

    /// Attach diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// The result of a create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// State after the operation.
    pub new_state: serde_json::Value,
    /// Diagnostics raised by the operation.
    pub diagnostics: Vec<Diagnostic>,
}

impl ApplyResult {
    /// A result carrying `new_state` and `diagnostics`.
    pub fn new(new_state: serde_json::Value, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            new_state,
            diagnostics,
        }
    }
}

/// The result of a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Refreshed state, or `None` when the remote object is gone.
    pub new_state: Option<serde_json::Value>,
    /// Diagnostics raised by the read.
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadResult {
    /// The object still exists.
    pub fn found(state: serde_json::Value, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            new_state: Some(state),
            diagnostics,
        }
    }

    /// The object no longer exists and should be dropped from state.
    pub fn gone() -> Self {
        Self {
            new_state: None,
            diagnostics: Vec::new(),
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// The result of an import.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportResult {
    /// Imported resources.
    pub imported: Vec<ImportedResource>,
    /// Diagnostics raised by the import.
    pub diagnostics: Vec<Diagnostic>,
}

/// The result of opening an ephemeral resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenResult {
    /// The ephemeral value handed to the caller.
    pub result: serde_json::Value,
    /// Opaque private state passed back on renew and close.
    pub private: Vec<u8>,
    /// When the host should call renew, if ever.
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics raised by the open.
    pub diagnostics: Vec<Diagnostic>,
}

/// The result of renewing an ephemeral resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewResult {
    /// Updated private state.
    pub private: Vec<u8>,
    /// Next renewal time, if any.
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics raised by the renewal.
    pub diagnostics: Vec<Diagnostic>,
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of ephemeral resource type names.
    pub ephemeral_resources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider supports planning destroy operations.
    pub plan_destroy: bool,
}
