use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

use crate::models::GeneratedArtifact;

#[derive(Default)]
struct Inner {
    artifacts: VecDeque<GeneratedArtifact>,
    selection: HashSet<Uuid>,
}

/// Artifacts generated during this run, oldest first, plus the batch selection.
///
/// With a capacity set, adding past it evicts the oldest artifact and drops it
/// from the selection.
pub struct ResultCollection {
    capacity: Option<usize>,
    inner: RwLock<Inner>,
}

impl ResultCollection {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.filter(|cap| *cap > 0),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Returns `false` if an artifact with the same id is already present.
    pub fn add(&self, artifact: GeneratedArtifact) -> bool {
        let mut inner = self.inner.write();
        if inner.artifacts.iter().any(|a| a.request_id == artifact.request_id) {
            return false;
        }

        inner.artifacts.push_back(artifact);
        if let Some(capacity) = self.capacity {
            while inner.artifacts.len() > capacity {
                if let Some(evicted) = inner.artifacts.pop_front() {
                    inner.selection.remove(&evicted.request_id);
                    debug!(request_id = %evicted.request_id, "Evicted oldest artifact");
                }
            }
        }
        true
    }

    pub fn get(&self, request_id: Uuid) -> Option<GeneratedArtifact> {
        self.inner
            .read()
            .artifacts
            .iter()
            .find(|a| a.request_id == request_id)
            .cloned()
    }

    pub fn contains(&self, request_id: Uuid) -> bool {
        self.inner.read().artifacts.iter().any(|a| a.request_id == request_id)
    }

    pub fn list(&self) -> Vec<GeneratedArtifact> {
        self.inner.read().artifacts.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().artifacts.is_empty()
    }

    /// No-op for ids not in the collection.
    pub fn select(&self, request_id: Uuid) -> bool {
        let mut inner = self.inner.write();
        if !inner.artifacts.iter().any(|a| a.request_id == request_id) {
            return false;
        }
        inner.selection.insert(request_id)
    }

    pub fn deselect(&self, request_id: Uuid) -> bool {
        self.inner.write().selection.remove(&request_id)
    }

    pub fn toggle(&self, request_id: Uuid) -> bool {
        if self.is_selected(request_id) {
            self.deselect(request_id);
            false
        } else {
            self.select(request_id)
        }
    }

    pub fn select_all(&self) {
        let mut inner = self.inner.write();
        let ids: Vec<Uuid> = inner.artifacts.iter().map(|a| a.request_id).collect();
        inner.selection.extend(ids);
    }

    pub fn clear_selection(&self) {
        self.inner.write().selection.clear();
    }

    pub fn is_selected(&self, request_id: Uuid) -> bool {
        self.inner.read().selection.contains(&request_id)
    }

    /// Selected ids in collection order.
    pub fn selected(&self) -> Vec<Uuid> {
        let inner = self.inner.read();
        inner
            .artifacts
            .iter()
            .map(|a| a.request_id)
            .filter(|id| inner.selection.contains(id))
            .collect()
    }

    /// Drops every artifact and the selection.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.artifacts.clear();
        inner.selection.clear();
    }
}
