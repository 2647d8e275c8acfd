use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

/// Fields stripped before content comparison. Audit stamps change on every
/// write and must not turn an untouched child into a "modified" one.
pub const IGNORED_FIELDS: &[&str] = &["created_at", "updated_at"];

/// An instance that can take part in a UUID-keyed collection diff.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for crate::model::AttributeInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for crate::model::PortInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for crate::model::ClassInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for crate::model::RoleInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for crate::model::RelationclassInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for crate::model::SceneInstance {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

/// Three-way partition of one owned collection. The buckets are disjoint by
/// construction: a UUID is in exactly one of them, or in none (unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDiff<T> {
    pub added: Vec<T>,
    pub modified: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> CollectionDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

impl<T> Default for CollectionDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Pure comparison of a persisted composite's owned collection against a
/// proposed one. No I/O, deterministic for any two inputs.
pub struct DiffEngine;

impl DiffEngine {
    /// Partition `desired` against `current`:
    /// - added: desired items whose UUID is absent from current,
    /// - modified: items present on both sides whose canonicalized content
    ///   differs,
    /// - removed: current items whose UUID is absent from desired.
    pub fn partition<T>(current: &[T], desired: &[T]) -> CollectionDiff<T>
    where
        T: Keyed + Serialize + Clone,
    {
        let current_index: HashMap<Uuid, &T> =
            current.iter().map(|item| (item.key(), item)).collect();
        let desired_index: HashMap<Uuid, &T> =
            desired.iter().map(|item| (item.key(), item)).collect();

        let mut diff = CollectionDiff::default();

        for item in desired {
            match current_index.get(&item.key()) {
                None => diff.added.push(item.clone()),
                Some(stored) => {
                    if Self::canonical(item) != Self::canonical(*stored) {
                        diff.modified.push(item.clone());
                    }
                }
            }
        }

        for item in current {
            if !desired_index.contains_key(&item.key()) {
                diff.removed.push(item.clone());
            }
        }

        diff
    }

    /// Serialized content with ignored fields stripped at every nesting
    /// level, so audit stamps on embedded children do not leak into the
    /// comparison either.
    fn canonical<T: Serialize>(item: &T) -> serde_json::Value {
        let mut value = serde_json::to_value(item).unwrap_or(serde_json::Value::Null);
        Self::strip_ignored(&mut value);
        value
    }

    fn strip_ignored(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for field in IGNORED_FIELDS {
                    map.remove(*field);
                }
                for nested in map.values_mut() {
                    Self::strip_ignored(nested);
                }
            }
            serde_json::Value::Array(items) => {
                for nested in items.iter_mut() {
                    Self::strip_ignored(nested);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeInstance;
    use std::collections::HashSet;

    fn attribute(value: &str) -> AttributeInstance {
        AttributeInstance::with_value(Uuid::new_v4(), serde_json::json!(value))
    }

    #[test]
    fn partition_buckets_are_disjoint() {
        let a = attribute("a");
        let b = attribute("b");
        let mut b_modified = b.clone();
        b_modified.value = Some(serde_json::json!("b2"));
        let c = attribute("c");

        let current = vec![a.clone(), b];
        let desired = vec![b_modified.clone(), c.clone()];

        let diff = DiffEngine::partition(&current, &desired);
        assert_eq!(
            diff.added.iter().map(|i| i.uuid()).collect::<Vec<_>>(),
            vec![c.uuid()]
        );
        assert_eq!(
            diff.modified.iter().map(|i| i.uuid()).collect::<Vec<_>>(),
            vec![b_modified.uuid()]
        );
        assert_eq!(
            diff.removed.iter().map(|i| i.uuid()).collect::<Vec<_>>(),
            vec![a.uuid()]
        );

        let mut all = HashSet::new();
        for item in diff
            .added
            .iter()
            .chain(diff.modified.iter())
            .chain(diff.removed.iter())
        {
            assert!(all.insert(item.uuid()), "uuid appeared in two buckets");
        }
    }

    #[test]
    fn audit_stamps_do_not_count_as_modification() {
        let original = attribute("same");
        let mut touched = original.clone();
        touched.base.updated_at = chrono::Utc::now();

        let diff = DiffEngine::partition(
            std::slice::from_ref(&original),
            std::slice::from_ref(&touched),
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn identical_collections_produce_empty_diff() {
        let items = vec![attribute("x"), attribute("y")];
        let diff = DiffEngine::partition(&items, &items.clone());
        assert!(diff.is_empty());
    }
}
