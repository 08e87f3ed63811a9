//! Mutation observation.
//!
//! Observers register interest in a target node; every structural or
//! attribute change the document performs is turned into a `MutationRecord`
//! and queued on each observer whose registrations cover the changed node.
//! Queued records are handed out in batches by `Document::take_records`,
//! one batch per observer, in observer creation order.
//!
//! Invariants:
//! - A record is queued at most once per observer, even when several of its
//!   registrations match.
//! - Registrations on an ancestor only match when `subtree` is set.
//! - `disconnect` drops the observer's registrations and its queued records.

use crate::types::NodeKey;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    /// Restricts attribute records to these names. `None` accepts all.
    pub attribute_filter: Option<Vec<Arc<str>>>,
    pub subtree: bool,
}

impl ObserveOptions {
    pub fn child_list() -> Self {
        Self {
            child_list: true,
            ..Self::default()
        }
    }

    pub fn with_subtree(mut self) -> Self {
        self.subtree = true;
        self
    }

    pub fn with_attributes(mut self, filter: &[&str]) -> Self {
        self.attributes = true;
        self.attribute_filter = if filter.is_empty() {
            None
        } else {
            Some(filter.iter().map(|name| Arc::from(*name)).collect())
        };
        self
    }

    fn accepts(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { .. } => self.child_list,
            MutationRecord::Attributes { name, .. } => {
                self.attributes
                    && self.attribute_filter.as_ref().is_none_or(|filter| {
                        filter.iter().any(|f| f.eq_ignore_ascii_case(name))
                    })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeKey,
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
    },
    Attributes {
        target: NodeKey,
        name: Arc<str>,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeKey {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attributes { target, .. } => {
                *target
            }
        }
    }
}

/// Records queued for one observer since its last delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationBatch {
    pub observer: ObserverId,
    pub records: Vec<MutationRecord>,
}

struct Registration {
    target: NodeKey,
    options: ObserveOptions,
}

#[derive(Default)]
struct ObserverState {
    registrations: Vec<Registration>,
    queue: Vec<MutationRecord>,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: BTreeMap<ObserverId, ObserverState>,
    next: u32,
}

impl ObserverRegistry {
    pub(crate) fn create(&mut self) -> ObserverId {
        self.next += 1;
        let id = ObserverId(self.next);
        self.observers.insert(id, ObserverState::default());
        id
    }

    pub(crate) fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    /// Observing a target twice replaces the earlier options for that target.
    pub(crate) fn observe(&mut self, id: ObserverId, target: NodeKey, options: ObserveOptions) -> bool {
        let Some(state) = self.observers.get_mut(&id) else {
            return false;
        };
        match state.registrations.iter_mut().find(|r| r.target == target) {
            Some(existing) => existing.options = options,
            None => state.registrations.push(Registration { target, options }),
        }
        true
    }

    pub(crate) fn disconnect(&mut self, id: ObserverId) {
        if let Some(state) = self.observers.get_mut(&id) {
            state.registrations.clear();
            state.queue.clear();
        }
    }

    pub(crate) fn is_observing(&self, id: ObserverId) -> bool {
        self.observers
            .get(&id)
            .is_some_and(|state| !state.registrations.is_empty())
    }

    /// `path` is the changed node followed by its ancestors, nearest first.
    pub(crate) fn queue(&mut self, record: &MutationRecord, path: &[NodeKey]) {
        for state in self.observers.values_mut() {
            let matched = state.registrations.iter().any(|reg| {
                match path.iter().position(|k| *k == reg.target) {
                    Some(0) => reg.options.accepts(record),
                    Some(_) => reg.options.subtree && reg.options.accepts(record),
                    None => false,
                }
            });
            if matched {
                state.queue.push(record.clone());
            }
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.observers.values().any(|state| !state.queue.is_empty())
    }

    pub(crate) fn take(&mut self) -> Vec<MutationBatch> {
        self.observers
            .iter_mut()
            .filter(|(_, state)| !state.queue.is_empty())
            .map(|(id, state)| MutationBatch {
                observer: *id,
                records: std::mem::take(&mut state.queue),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(target: u32, name: &str) -> MutationRecord {
        MutationRecord::Attributes {
            target: NodeKey(target),
            name: Arc::from(name),
            old_value: None,
        }
    }

    #[test]
    fn attribute_filter_is_case_insensitive() {
        let options = ObserveOptions::default().with_attributes(&["class", "href"]);
        assert!(options.accepts(&attr(1, "CLASS")));
        assert!(options.accepts(&attr(1, "href")));
        assert!(!options.accepts(&attr(1, "style")));
    }

    #[test]
    fn empty_filter_accepts_every_attribute() {
        let options = ObserveOptions::default().with_attributes(&[]);
        assert!(options.accepts(&attr(1, "data-anything")));
    }

    #[test]
    fn ancestor_registration_needs_subtree() {
        let mut registry = ObserverRegistry::default();
        let shallow = registry.create();
        let deep = registry.create();
        registry.observe(shallow, NodeKey(1), ObserveOptions::default().with_attributes(&[]));
        registry.observe(
            deep,
            NodeKey(1),
            ObserveOptions::default().with_attributes(&[]).with_subtree(),
        );

        registry.queue(&attr(3, "class"), &[NodeKey(3), NodeKey(2), NodeKey(1)]);

        let batches = registry.take();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].observer, deep);
        assert!(!registry.has_pending());
    }

    #[test]
    fn overlapping_registrations_queue_once() {
        let mut registry = ObserverRegistry::default();
        let id = registry.create();
        let options = ObserveOptions::child_list().with_subtree();
        registry.observe(id, NodeKey(1), options.clone());
        registry.observe(id, NodeKey(2), options);

        let record = MutationRecord::ChildList {
            target: NodeKey(2),
            added: vec![NodeKey(5)],
            removed: Vec::new(),
        };
        registry.queue(&record, &[NodeKey(2), NodeKey(1)]);

        let batches = registry.take();
        assert_eq!(batches[0].records, vec![record]);
    }

    #[test]
    fn disconnect_drops_queued_records() {
        let mut registry = ObserverRegistry::default();
        let id = registry.create();
        registry.observe(id, NodeKey(1), ObserveOptions::default().with_attributes(&[]));
        registry.queue(&attr(1, "class"), &[NodeKey(1)]);
        registry.disconnect(id);

        assert!(!registry.has_pending());
        assert!(!registry.is_observing(id));
        assert!(registry.contains(id));
    }
}
