use std::collections::{HashMap, HashSet};

use crate::store::Value;
use crate::Key;

/// An immutable shallow copy of the data fields at one instant.
///
/// Capturing clones handles, not payloads, so a snapshot is cheap no
/// matter how large the individual field values are.
pub(crate) struct Snapshot {
    values: HashMap<Key, Value>,
}

impl Snapshot {
    pub(crate) fn capture(fields: &HashMap<Key, Value>) -> Self {
        Snapshot {
            values: fields.clone(),
        }
    }

    /// The subset of `touched` whose value differs between this snapshot
    /// and the live fields, under identity-or-equality comparison.
    pub(crate) fn changed_keys(
        &self,
        live: &HashMap<Key, Value>,
        touched: &HashSet<Key>,
    ) -> HashSet<Key> {
        touched
            .iter()
            .copied()
            .filter(|key| {
                match (self.values.get(key), live.get(key)) {
                    (Some(before), Some(after)) => !before.same(after),
                    // Field sets are closed at construction; a missing side
                    // would mean the key never named a data field.
                    _ => false,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(Key, i32)]) -> HashMap<Key, Value> {
        pairs.iter().map(|&(k, v)| (k, Value::new(v))).collect()
    }

    #[test]
    fn untouched_keys_are_ignored() {
        let before = fields(&[("a", 1), ("b", 2)]);
        let snap = Snapshot::capture(&before);

        let mut live = before.clone();
        live.insert("a", Value::new(10));

        // "a" changed but was not touched, so the diff never sees it.
        let touched: HashSet<Key> = ["b"].into_iter().collect();
        assert!(snap.changed_keys(&live, &touched).is_empty());
    }

    #[test]
    fn touched_and_changed() {
        let before = fields(&[("a", 1), ("b", 2)]);
        let snap = Snapshot::capture(&before);

        let mut live = before.clone();
        live.insert("a", Value::new(10));

        let touched: HashSet<Key> = ["a", "b"].into_iter().collect();
        let changed = snap.changed_keys(&live, &touched);
        assert_eq!(changed, ["a"].into_iter().collect());
    }

    #[test]
    fn equal_rewrite_is_not_a_change() {
        let before = fields(&[("count", 3)]);
        let snap = Snapshot::capture(&before);

        let mut live = before.clone();
        live.insert("count", Value::new(3));

        let touched: HashSet<Key> = ["count"].into_iter().collect();
        assert!(snap.changed_keys(&live, &touched).is_empty());
    }
}
