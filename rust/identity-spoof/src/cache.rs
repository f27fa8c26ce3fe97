//! Memoization of spoofed identities, keyed by package.
//!
//! Entries are written once and never refreshed or evicted. Manifest metadata
//! only changes on reinstall, and reinstall restarts the hosting process.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Two independent maps: package → spoofed name, package → spoofed signature hex.
#[derive(Debug, Default)]
pub struct SpoofCache {
    names: RwLock<HashMap<String, String>>,
    signatures: RwLock<HashMap<String, String>>,
}

/// Which of the two maps a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Name,
    Signature,
}

impl SpoofCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, slot: Slot) -> &RwLock<HashMap<String, String>> {
        match slot {
            Slot::Name => &self.names,
            Slot::Signature => &self.signatures,
        }
    }

    pub(crate) fn get(&self, slot: Slot, package: &str) -> Option<String> {
        let guard = self
            .map(slot)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(package).cloned()
    }

    /// Store `value` unless another caller got there first; returns the stored value.
    pub(crate) fn insert(&self, slot: Slot, package: &str, value: String) -> String {
        let mut guard = self
            .map(slot)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(package.to_string()).or_insert(value).clone()
    }

    /// Cached spoofed package name for `package`, if any.
    pub fn spoofed_name(&self, package: &str) -> Option<String> {
        self.get(Slot::Name, package)
    }

    /// Cached spoofed signature (hex) for `package`, if any.
    pub fn spoofed_signature(&self, package: &str) -> Option<String> {
        self.get(Slot::Signature, package)
    }

    pub fn name_count(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
