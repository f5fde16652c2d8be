//! Allowlist of tags whose measurements are forwarded.

use crate::mac_address::MacAddress;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// Shared, updatable allowlist.
///
/// An empty list lets every tag through. Addresses compare as bytes, so
/// the case used when configuring them does not matter.
#[derive(Debug, Default)]
pub struct TagFilter {
    enabled: RwLock<BTreeSet<MacAddress>>,
}

impl TagFilter {
    pub fn new(tags: impl IntoIterator<Item = MacAddress>) -> Self {
        Self {
            enabled: RwLock::new(tags.into_iter().collect()),
        }
    }

    /// Replace the allowlist.
    pub fn update(&self, tags: impl IntoIterator<Item = MacAddress>) {
        let tags: BTreeSet<MacAddress> = tags.into_iter().collect();
        tracing::info!(count = tags.len(), "updated enabled tags");
        *self.enabled.write().unwrap_or_else(PoisonError::into_inner) = tags;
    }

    pub fn is_enabled(&self, mac: &MacAddress) -> bool {
        let enabled = self.enabled.read().unwrap_or_else(PoisonError::into_inner);
        enabled.is_empty() || enabled.contains(mac)
    }

    /// A copy of the current allowlist; empty means everything is allowed.
    pub fn enabled_tags(&self) -> Vec<MacAddress> {
        self.enabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}
