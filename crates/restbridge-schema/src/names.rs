//! Bidirectional property-name translation between the SDK (engine-facing)
//! names and the names the REST API uses on the wire.

use crate::value::{PropertyMap, PropertyValue};
use std::collections::BTreeMap;

/// Which way a translation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Engine names to API names, for outgoing request bodies.
    ToApi,
    /// API names to engine names, for decoded responses.
    ToSdk,
}

/// External↔internal property-name table. A name without an entry maps to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNameMap {
    sdk_to_api: BTreeMap<String, String>,
    api_to_sdk: BTreeMap<String, String>,
}

impl FieldNameMap {
    /// Build from the two directional tables. Entries present in only one
    /// table are mirrored into the other.
    pub fn new(
        sdk_to_api: BTreeMap<String, String>,
        api_to_sdk: BTreeMap<String, String>,
    ) -> Self {
        let mut map = Self {
            sdk_to_api,
            api_to_sdk,
        };
        for (sdk, api) in map.sdk_to_api.clone() {
            map.api_to_sdk.entry(api).or_insert(sdk);
        }
        for (api, sdk) in map.api_to_sdk.clone() {
            map.sdk_to_api.entry(sdk).or_insert(api);
        }
        map
    }

    /// Build from `(sdk_name, api_name)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let sdk_to_api = pairs
            .into_iter()
            .map(|(sdk, api)| (sdk.to_owned(), api.to_owned()))
            .collect();
        Self::new(sdk_to_api, BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.sdk_to_api.is_empty() && self.api_to_sdk.is_empty()
    }

    pub fn to_api<'a>(&'a self, sdk_name: &'a str) -> &'a str {
        self.sdk_to_api.get(sdk_name).map_or(sdk_name, String::as_str)
    }

    pub fn to_sdk<'a>(&'a self, api_name: &'a str) -> &'a str {
        self.api_to_sdk.get(api_name).map_or(api_name, String::as_str)
    }

    fn rename<'a>(&'a self, name: &'a str, direction: Direction) -> &'a str {
        match direction {
            Direction::ToApi => self.to_api(name),
            Direction::ToSdk => self.to_sdk(name),
        }
    }

    /// Re-key every map entry recursively, descending into nested maps and
    /// into each element of nested lists. Scalars are returned unchanged and
    /// secret/output wrappers are preserved around the translated element.
    pub fn translate(&self, value: &PropertyValue, direction: Direction) -> PropertyValue {
        match value {
            PropertyValue::Object(map) => PropertyValue::Object(self.translate_map(map, direction)),
            PropertyValue::Array(items) => PropertyValue::Array(
                items
                    .iter()
                    .map(|item| self.translate(item, direction))
                    .collect(),
            ),
            PropertyValue::Secret(inner) => PropertyValue::secret(self.translate(inner, direction)),
            PropertyValue::Output(inner) => PropertyValue::output(self.translate(inner, direction)),
            scalar => scalar.clone(),
        }
    }

    pub fn translate_map(&self, map: &PropertyMap, direction: Direction) -> PropertyMap {
        map.iter()
            .map(|(key, value)| {
                let renamed = self.rename(key, direction);
                if renamed != key.as_str() {
                    tracing::trace!("renaming property {key} -> {renamed}");
                }
                (renamed.to_owned(), self.translate(value, direction))
            })
            .collect()
    }
}
