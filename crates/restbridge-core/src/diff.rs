//! Classification of input changes into in-place updates and replacements.

use restbridge_schema::{EndpointMap, ObjectDiff, PropertyMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Overall verdict of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffChanges {
    None,
    Some,
    /// The update schema gave nothing to classify against.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    pub kind: DiffKind,
    pub input_diff: bool,
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub changes: DiffChanges,
    /// Keys that change, updatable in place unless also listed in `replaces`.
    pub diffs: Vec<String>,
    pub replaces: Vec<String>,
    pub detailed_diff: BTreeMap<String, PropertyDiff>,
    pub delete_before_replace: bool,
}

impl DiffResult {
    pub fn no_changes() -> Self {
        Self {
            changes: DiffChanges::None,
            diffs: Vec::new(),
            replaces: Vec::new(),
            detailed_diff: BTreeMap::new(),
            delete_before_replace: false,
        }
    }

    pub fn indeterminate() -> Self {
        Self {
            changes: DiffChanges::Unknown,
            ..Self::no_changes()
        }
    }

    pub fn requires_replacement(&self) -> bool {
        !self.replaces.is_empty()
    }
}

fn kinds(diff: &ObjectDiff) -> BTreeMap<&str, DiffKind> {
    let mut out = BTreeMap::new();
    for key in diff.adds.keys() {
        out.insert(key.as_str(), DiffKind::Add);
    }
    for key in diff.updates.keys() {
        out.insert(key.as_str(), DiffKind::Update);
    }
    for key in diff.deletes.keys() {
        out.insert(key.as_str(), DiffKind::Delete);
    }
    out
}

/// Structural comparison of recorded inputs against proposed inputs.
pub fn structural(olds: &PropertyMap, news: &PropertyMap) -> ObjectDiff {
    ObjectDiff::compute(olds, news)
}

/// Classify a non-empty structural diff.
///
/// `create_params` are the engine-side names of the create endpoint's path
/// parameters. `updatable` is the property set of the update body schema with
/// `allOf` flattened, or `None` when the type has no update endpoint.
pub fn classify(
    diff: &ObjectDiff,
    endpoints: &EndpointMap,
    create_params: &[&str],
    updatable: Option<&BTreeSet<&str>>,
) -> DiffResult {
    if !diff.any_changes() {
        return DiffResult::no_changes();
    }
    let changed = kinds(diff);

    if endpoints.is_replace_only() {
        // An import only learns the path parameters; adding exactly those is not a change.
        let added: BTreeSet<&str> = diff.adds.keys().map(String::as_str).collect();
        let params: BTreeSet<&str> = create_params.iter().copied().collect();
        if diff.only_adds() && added == params {
            debug!("only create path parameters were added: {added:?}");
            return DiffResult::no_changes();
        }

        let keys: Vec<String> = changed.keys().map(|k| (*k).to_owned()).collect();
        return DiffResult {
            changes: DiffChanges::Some,
            diffs: keys.clone(),
            replaces: keys,
            detailed_diff: changed
                .into_iter()
                .map(|(k, kind)| {
                    (
                        k.to_owned(),
                        PropertyDiff {
                            kind,
                            input_diff: true,
                            replace: true,
                        },
                    )
                })
                .collect(),
            delete_before_replace: false,
        };
    }

    let Some(updatable) = updatable.filter(|p| !p.is_empty()) else {
        debug!("update schema declares no properties; changes are indeterminate");
        return DiffResult::indeterminate();
    };

    let mut result = DiffResult {
        changes: DiffChanges::Some,
        ..DiffResult::no_changes()
    };
    for (key, kind) in changed {
        let replace = !updatable.contains(key);
        if replace {
            result.replaces.push(key.to_owned());
        } else {
            result.diffs.push(key.to_owned());
        }
        result.detailed_diff.insert(
            key.to_owned(),
            PropertyDiff {
                kind,
                input_diff: true,
                replace,
            },
        );
    }
    result
}
