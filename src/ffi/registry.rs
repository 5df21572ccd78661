//! Signature Registry
//!
//! Declarative table from function name to calling contract. Registries are
//! plain data: they are declared ahead of time, merged, and looked up.

use std::collections::HashMap;

use super::types::{FfiSignature, FfiType};
use super::FfiError;

/// Ordered name -> signature table
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    /// Signatures in declaration order
    entries: Vec<FfiSignature>,
    /// Name -> position in `entries`
    index: HashMap<String, usize>,
}

impl SignatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from signatures, failing on conflicting duplicates
    pub fn from_signatures(
        signatures: impl IntoIterator<Item = FfiSignature>,
    ) -> Result<Self, FfiError> {
        let mut registry = Self::new();
        for signature in signatures {
            registry.register(signature)?;
        }
        Ok(registry)
    }

    /// Register a signature.
    ///
    /// Re-registering an identical contract is a no-op; a different contract
    /// under the same name is a [`FfiError::SignatureConflict`].
    pub fn register(&mut self, signature: FfiSignature) -> Result<(), FfiError> {
        if let Some(&pos) = self.index.get(&signature.name) {
            if self.entries[pos].same_contract(&signature) {
                return Ok(());
            }
            return Err(FfiError::SignatureConflict(signature.name));
        }
        self.index.insert(signature.name.clone(), self.entries.len());
        self.entries.push(signature);
        Ok(())
    }

    /// Shorthand for registering `FfiSignature::new(name, params, ret)`
    pub fn declare(
        &mut self,
        name: &str,
        params: Vec<FfiType>,
        return_type: FfiType,
    ) -> Result<(), FfiError> {
        self.register(FfiSignature::new(name, params, return_type))
    }

    /// Union of two registries; `other`'s new names are appended in order
    pub fn merge(mut self, other: &SignatureRegistry) -> Result<Self, FfiError> {
        for signature in other.iter() {
            self.register(signature.clone())?;
        }
        Ok(self)
    }

    /// Get a signature by name
    pub fn get(&self, name: &str) -> Option<&FfiSignature> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// Check whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate over signatures in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &FfiSignature> {
        self.entries.iter()
    }

    /// Registered names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
