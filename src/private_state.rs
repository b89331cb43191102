//! Provider-private state.
//!
//! The host persists an opaque byte blob alongside each resource or ephemeral
//! resource. The provider stores JSON documents in it, one per Rust type,
//! keyed by the type's short name.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ProviderError;

/// JSON documents keyed by type name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrivateState {
    entries: BTreeMap<String, serde_json::Value>,
}

impl PrivateState {
    /// Create empty private state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the blob handed back by the host. An empty blob is empty state.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProviderError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            entries: serde_json::from_slice(bytes)?,
        })
    }

    /// Encode for the host.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProviderError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Load the value stored for `T`, if any.
    pub fn get_key<T: DeserializeOwned>(&self) -> Result<Option<T>, ProviderError> {
        match self.entries.get(key_for::<T>()) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// Store `value` under its type's key, replacing any previous value.
    pub fn set_key<T: Serialize>(&mut self, value: &T) -> Result<(), ProviderError> {
        self.entries
            .insert(key_for::<T>().to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove the value stored for `T`.
    pub fn remove_key<T>(&mut self) {
        self.entries.remove(key_for::<T>());
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key_for<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // strip generic arguments before taking the last path segment
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct PreviousBindings {
        ids: Vec<String>,
    }

    #[test]
    fn test_set_get_roundtrip_through_bytes() {
        let mut state = PrivateState::new();
        state
            .set_key(&PreviousBindings {
                ids: vec!["a".into()],
            })
            .unwrap();

        let bytes = state.to_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.get("PreviousBindings").is_some());

        let restored = PrivateState::from_bytes(&bytes).unwrap();
        let value: Option<PreviousBindings> = restored.get_key().unwrap();
        assert_eq!(value.unwrap().ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_empty_blob() {
        let state = PrivateState::from_bytes(&[]).unwrap();
        assert!(state.is_empty());
        assert!(state.to_bytes().unwrap().is_empty());
        assert!(state.get_key::<PreviousBindings>().unwrap().is_none());
    }

    #[test]
    fn test_remove_key() {
        let mut state = PrivateState::new();
        state.set_key(&PreviousBindings { ids: vec![] }).unwrap();
        state.remove_key::<PreviousBindings>();
        assert!(state.is_empty());
    }

    #[test]
    fn test_garbage_blob_is_error() {
        assert!(PrivateState::from_bytes(b"not json").is_err());
    }
}
