// SPDX-License-Identifier: GPL-3.0-only
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Sync tags that were requested and not yet confirmed complete.
///
/// The connectivity monitor marks, the lifecycle controller clears when the
/// worker reports the batch done. Completion delivery is best-effort, so a
/// tag may stay marked until the next successful pass.
#[derive(Debug, Default)]
pub struct PendingSyncTracker {
    tags: Mutex<BTreeSet<String>>,
}

impl PendingSyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the tag was not already outstanding.
    pub fn mark(&self, tag: &str) -> bool {
        self.lock().insert(tag.to_string())
    }

    /// Returns `true` when an outstanding request was cleared.
    pub fn clear(&self, tag: &str) -> bool {
        self.lock().remove(tag)
    }

    #[cfg(test)]
    pub fn is_pending(&self, tag: &str) -> bool {
        self.lock().contains(tag)
    }

    pub fn pending_tags(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A poisoned set of strings is still a valid set.
        self.tags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
