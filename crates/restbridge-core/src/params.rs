//! Path-parameter resolution.
//!
//! Each `{placeholder}` of a path template is filled from, in order:
//!
//! 1. the current properties, by engine-side name and then by raw name;
//! 2. a key of the same name inside any top-level object property;
//! 3. the provider-wide path defaults;
//! 4. the recorded inputs;
//! 5. for the last placeholder only, when its name ends in `id`, the
//!    resource's primary identifier.
//!
//! Resolution is all-or-nothing. Steps 2 and 5 are best-effort guesses; a
//! pre-request hook can rewrite the URL when they pick the wrong value.

use crate::catalog::Catalog;
use crate::CoreError;
use restbridge_schema::{HttpMethod, PropertyMap, PropertyValue};
use std::collections::BTreeMap;
use tracing::trace;

/// Provider-wide values for common path segments, set at configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathDefaults(BTreeMap<String, String>);

impl PathDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PathDefaults {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where path-parameter values may come from for one call.
#[derive(Debug, Clone, Copy)]
pub struct ParamSources<'a> {
    pub properties: &'a PropertyMap,
    pub recorded_inputs: Option<&'a PropertyMap>,
    pub id: Option<&'a str>,
}

impl<'a> ParamSources<'a> {
    pub fn new(properties: &'a PropertyMap) -> Self {
        Self {
            properties,
            recorded_inputs: None,
            id: None,
        }
    }

    #[must_use]
    pub fn with_recorded_inputs(mut self, inputs: Option<&'a PropertyMap>) -> Self {
        self.recorded_inputs = inputs;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<&'a str>) -> Self {
        self.id = id;
        self
    }
}

/// Names of the `{...}` placeholders of a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    names
}

/// Replace each `{name}` with its value, percent-encoded as one path segment.
///
/// The template is scanned once, so substituted text is never expanded again.
/// Placeholders without a value are left as written.
pub fn substitute(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        path.push_str(&rest[..start]);
        let name = &after[..end];
        match values.get(name) {
            Some(value) => path.push_str(&urlencoding::encode(value)),
            None => {
                path.push('{');
                path.push_str(name);
                path.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    path.push_str(rest);
    path
}

/// Scalar text of a value usable as a path segment. Computed values never resolve.
fn scalar(value: &PropertyValue) -> Option<String> {
    if value.is_computed() {
        return None;
    }
    value.to_scalar_string().filter(|s| !s.is_empty())
}

fn lookup(map: &PropertyMap, internal: &str, raw: &str) -> Option<String> {
    map.get(internal)
        .and_then(scalar)
        .or_else(|| map.get(raw).and_then(scalar))
}

fn pluck(map: &PropertyMap, internal: &str, raw: &str) -> Option<String> {
    map.values()
        .filter_map(PropertyValue::as_object)
        .find_map(|nested| lookup(nested, internal, raw))
}

fn is_id_shaped(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("id")
}

/// Resolve every path parameter of `template` for `method`.
pub fn resolve(
    catalog: &Catalog,
    type_token: &str,
    template: &str,
    method: HttpMethod,
    sources: ParamSources<'_>,
    defaults: &PathDefaults,
) -> Result<BTreeMap<String, String>, CoreError> {
    let declared = catalog.document().path_parameter_names(template, method)?;
    let in_template = placeholders(template);

    if declared.is_empty() {
        return match in_template.first() {
            Some(name) => Err(CoreError::MissingPathParameter {
                type_token: type_token.to_owned(),
                path: template.to_owned(),
                name: (*name).to_owned(),
            }),
            None => Ok(BTreeMap::new()),
        };
    }

    // Template order decides which placeholder is last.
    let mut ordered: Vec<&str> = in_template
        .iter()
        .copied()
        .filter(|name| declared.contains(name))
        .collect();
    ordered.extend(declared.iter().filter(|name| !in_template.contains(*name)));

    let mut values = BTreeMap::new();
    let last = ordered.len().saturating_sub(1);
    for (index, raw) in ordered.iter().copied().enumerate() {
        let internal = catalog.param_property_name(raw);
        let found = lookup(sources.properties, internal, raw)
            .map(|v| (v, "properties"))
            .or_else(|| pluck(sources.properties, internal, raw).map(|v| (v, "nested property")))
            .or_else(|| defaults.get(raw).map(|v| (v.to_owned(), "provider default")))
            .or_else(|| {
                sources
                    .recorded_inputs
                    .and_then(|inputs| lookup(inputs, internal, raw))
                    .map(|v| (v, "recorded inputs"))
            })
            .or_else(|| {
                (index == last && is_id_shaped(raw))
                    .then_some(sources.id)
                    .flatten()
                    .filter(|id| !id.is_empty())
                    .map(|id| (id.to_owned(), "resource id"))
            });

        let Some((value, origin)) = found else {
            return Err(CoreError::MissingPathParameter {
                type_token: type_token.to_owned(),
                path: template.to_owned(),
                name: raw.to_owned(),
            });
        };
        trace!("path parameter {raw} resolved from {origin}");
        values.insert(raw.to_owned(), value);
    }
    Ok(values)
}
