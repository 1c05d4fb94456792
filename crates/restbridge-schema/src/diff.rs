use crate::value::{PropertyMap, PropertyValue};
use std::collections::BTreeMap;

/// Old and new value of a property that changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDiff {
    pub old: PropertyValue,
    pub new: PropertyValue,
}

/// Top-level structural difference between two property maps.
///
/// Values are compared through secret/output wrappers, and a null value is
/// treated the same as a missing key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDiff {
    pub adds: PropertyMap,
    pub deletes: PropertyMap,
    pub updates: BTreeMap<String, ValueDiff>,
}

impl ObjectDiff {
    pub fn compute(olds: &PropertyMap, news: &PropertyMap) -> Self {
        let mut diff = Self::default();

        for (key, old) in olds.iter().filter(|(_, v)| v.has_value()) {
            match news.get(key).filter(|v| v.has_value()) {
                Some(new) if !old.deep_eq(new) => {
                    diff.updates.insert(
                        key.clone(),
                        ValueDiff {
                            old: old.clone(),
                            new: new.clone(),
                        },
                    );
                }
                Some(_) => {}
                None => {
                    diff.deletes.insert(key.clone(), old.clone());
                }
            }
        }

        for (key, new) in news.iter().filter(|(_, v)| v.has_value()) {
            if !olds.get(key).is_some_and(PropertyValue::has_value) {
                diff.adds.insert(key.clone(), new.clone());
            }
        }

        diff
    }

    pub fn any_changes(&self) -> bool {
        !self.adds.is_empty() || !self.deletes.is_empty() || !self.updates.is_empty()
    }

    /// Every added, updated, or deleted key, sorted.
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .adds
            .keys()
            .chain(self.updates.keys())
            .chain(self.deletes.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// True when the only changes are additions.
    pub fn only_adds(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && !self.adds.is_empty()
    }
}
