//! Persisted state: capture and recall of recorded inputs, read-only
//! filtering of observed objects, and overlay reconciliation.

use crate::CoreError;
use restbridge_schema::{
    Document, FieldNameMap, ObjectDiff, PropertyMap, PropertyValue, Schema,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Reserved state key holding the secret-wrapped recorded inputs.
pub const INPUTS_KEY: &str = "__inputs";
const ID_KEY: &str = "id";

/// Outputs plus a secret-wrapped copy of the inputs that produced them.
pub fn capture(outputs: &PropertyMap, inputs: &PropertyMap) -> PropertyMap {
    let mut state = outputs.clone();
    state.insert(
        INPUTS_KEY.to_owned(),
        PropertyValue::secret(PropertyValue::Object(inputs.clone())),
    );
    state
}

/// Recorded inputs of a persisted state, through any secret/output wrapping.
pub fn recall(state: &PropertyMap) -> Option<PropertyMap> {
    state
        .get(INPUTS_KEY)
        .and_then(PropertyValue::as_object)
        .cloned()
}

/// The state without its recorded-inputs slot.
pub fn outputs_of(state: &PropertyMap) -> PropertyMap {
    state
        .iter()
        .filter(|(k, _)| k.as_str() != INPUTS_KEY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Take additions and updates from `fresh` onto `base`. Nothing in `base` is removed.
pub fn overlay(fresh: &PropertyMap, base: &PropertyMap) -> PropertyMap {
    let diff = ObjectDiff::compute(base, fresh);
    if !diff.any_changes() {
        return base.clone();
    }
    let mut result = base.clone();
    result.extend(diff.adds);
    for (key, change) in diff.updates {
        result.insert(key, change.new);
    }
    result
}

/// Merge freshly returned outputs over the prior outputs.
pub fn reconcile_outputs(fresh: &PropertyMap, prior: &PropertyMap) -> PropertyMap {
    overlay(fresh, &outputs_of(prior))
}

/// Turn an observed object into inputs: drop what the create schema does not
/// accept, then overlay it onto the recorded inputs when there are any.
pub fn reconcile_read(
    doc: &Document,
    create_schema: Option<&Schema>,
    names: &FieldNameMap,
    observed: &PropertyMap,
    recorded: Option<&PropertyMap>,
) -> Result<PropertyMap, CoreError> {
    let filtered = match create_schema {
        Some(schema) => filter_read_only(doc, schema, names, observed)?,
        None => {
            let mut map = observed.clone();
            map.remove(ID_KEY);
            map
        }
    };
    Ok(match recorded {
        Some(recorded) => overlay(&filtered, recorded),
        None => filtered,
    })
}

/// Primary identifier of an output object: top-level `id`, else the `id` of
/// the first nested object carrying one.
pub fn extract_id(type_token: &str, outputs: &PropertyMap) -> Result<String, CoreError> {
    let scalar_id = |map: &PropertyMap| {
        map.get(ID_KEY)
            .and_then(PropertyValue::to_scalar_string)
            .filter(|s| !s.is_empty())
    };
    scalar_id(outputs)
        .or_else(|| {
            outputs
                .values()
                .filter_map(PropertyValue::as_object)
                .find_map(scalar_id)
        })
        .ok_or_else(|| CoreError::MissingIdentifier {
            type_token: type_token.to_owned(),
        })
}

/// Remove read-only properties, properties the schema does not declare, and
/// the top-level `id` from an engine-named object.
///
/// Nested objects and array items are filtered against their own schemas.
/// A schema with a discriminator narrows to the `oneOf` variant selected by
/// the object's discriminant value.
pub fn filter_read_only(
    doc: &Document,
    schema: &Schema,
    names: &FieldNameMap,
    observed: &PropertyMap,
) -> Result<PropertyMap, CoreError> {
    let mut filtered = filter_object(doc, schema, names, observed)?;
    filtered.remove(ID_KEY);
    Ok(filtered)
}

fn discriminant_of<'m>(
    schema: &Schema,
    names: &FieldNameMap,
    map: &'m PropertyMap,
) -> Option<&'m str> {
    let discriminator = schema.discriminator.as_ref()?;
    map.get(names.to_sdk(&discriminator.property_name))
        .or_else(|| map.get(&discriminator.property_name))
        .and_then(PropertyValue::as_str)
}

/// Declared properties of `schema`, including `allOf` branches and the
/// selected (or, without a discriminant, every) `oneOf`/`anyOf` branch.
fn declared_properties<'a>(
    doc: &'a Document,
    schema: &'a Schema,
    discriminant: Option<&str>,
) -> Result<BTreeMap<&'a str, &'a Schema>, CoreError> {
    let mut props = doc.flatten_properties(schema)?;
    let variant = match discriminant {
        Some(value) => doc.discriminated_variant(schema, value)?,
        None => None,
    };
    match variant {
        Some(variant) => props.extend(doc.flatten_properties(variant)?),
        None => {
            for branch in schema.one_of.iter().chain(&schema.any_of) {
                props.extend(doc.flatten_properties(branch)?);
            }
        }
    }
    Ok(props)
}

fn filter_object(
    doc: &Document,
    schema: &Schema,
    names: &FieldNameMap,
    map: &PropertyMap,
) -> Result<PropertyMap, CoreError> {
    let schema = doc.resolve(schema)?;
    let discriminant = discriminant_of(schema, names, map);
    let props = declared_properties(doc, schema, discriminant)?;
    if props.is_empty() && !schema.is_composed() {
        // Free-form object.
        return Ok(map.clone());
    }

    let mut out = PropertyMap::new();
    for (key, value) in map {
        let Some(prop) = props.get(names.to_api(key)) else {
            trace!("dropping undeclared property {key}");
            continue;
        };
        let prop = doc.resolve(prop)?;
        if prop.read_only {
            trace!("dropping read-only property {key}");
            continue;
        }
        out.insert(key.clone(), filter_value(doc, prop, names, value)?);
    }
    Ok(out)
}

fn filter_value(
    doc: &Document,
    schema: &Schema,
    names: &FieldNameMap,
    value: &PropertyValue,
) -> Result<PropertyValue, CoreError> {
    Ok(match value {
        PropertyValue::Object(map) => {
            PropertyValue::Object(filter_object(doc, schema, names, map)?)
        }
        PropertyValue::Array(items) => match schema.items.as_deref() {
            Some(item_schema) => PropertyValue::Array(
                items
                    .iter()
                    .map(|item| filter_value(doc, doc.resolve(item_schema)?, names, item))
                    .collect::<Result<_, _>>()?,
            ),
            None => value.clone(),
        },
        PropertyValue::Secret(inner) => {
            PropertyValue::secret(filter_value(doc, schema, names, inner)?)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use restbridge_schema::map_from_json;
    use serde_json::json;

    fn map(v: serde_json::Value) -> PropertyMap {
        map_from_json(v).unwrap()
    }

    fn doc() -> Document {
        serde_json::from_value(json!({
            "openapi": "3.0.3",
            "paths": {},
            "components": {"schemas": {
                "Thing": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "readOnly": true},
                        "createdAt": {"type": "string", "readOnly": true},
                        "name": {"type": "string"},
                        "display_name": {"type": "string"},
                        "settings": {"$ref": "#/components/schemas/Settings"},
                        "tags": {"type": "array", "items": {"$ref": "#/components/schemas/Tag"}},
                        "labels": {"type": "object"}
                    }
                },
                "Settings": {
                    "type": "object",
                    "properties": {
                        "size": {"type": "integer"},
                        "status": {"type": "string", "readOnly": true}
                    }
                },
                "Tag": {
                    "type": "object",
                    "properties": {"key": {"type": "string"}, "etag": {"type": "string", "readOnly": true}}
                },
                "Pet": {
                    "oneOf": [
                        {"$ref": "#/components/schemas/Dog"},
                        {"$ref": "#/components/schemas/Cat"}
                    ],
                    "discriminator": {"propertyName": "kind", "mapping": {"dog": "#/components/schemas/Dog"}}
                },
                "Dog": {"type": "object", "properties": {
                    "kind": {"type": "string"},
                    "bark": {"type": "string"},
                    "license": {"type": "string", "readOnly": true}
                }},
                "Cat": {"type": "object", "properties": {
                    "kind": {"type": "string"},
                    "meow": {"type": "string"},
                    "bark": {"type": "string", "readOnly": true}
                }}
            }}
        }))
        .unwrap()
    }

    fn schema_ref(name: &str) -> Schema {
        Schema {
            reference: Some(format!("#/components/schemas/{name}")),
            ..Schema::default()
        }
    }

    #[test]
    fn recall_inverts_capture() {
        let inputs = map(json!({"a": 1, "b": {"c": [1, "x"]}}));
        let outputs = map(json!({"id": "1", "a": 1}));
        let state = capture(&outputs, &inputs);
        assert!(state[INPUTS_KEY].is_secret());
        assert_eq!(recall(&state), Some(inputs));
        assert_eq!(outputs_of(&state), outputs);
    }

    #[test]
    fn recall_without_slot_is_none() {
        assert_eq!(recall(&map(json!({"id": "1"}))), None);
    }

    #[test]
    fn recall_through_plain_and_output_wrappers() {
        let inputs = map(json!({"a": 1}));
        let mut state = PropertyMap::new();
        state.insert(INPUTS_KEY.to_owned(), PropertyValue::Object(inputs.clone()));
        assert_eq!(recall(&state), Some(inputs.clone()));
        state.insert(
            INPUTS_KEY.to_owned(),
            PropertyValue::output(PropertyValue::Object(inputs.clone())),
        );
        assert_eq!(recall(&state), Some(inputs));
    }

    #[test]
    fn read_only_and_id_are_filtered() {
        let observed = map(json!({"id": "x", "createdAt": "2020-01-01", "name": "n"}));
        let filtered =
            filter_read_only(&doc(), &schema_ref("Thing"), &FieldNameMap::default(), &observed)
                .unwrap();
        assert_eq!(filtered, map(json!({"name": "n"})));
    }

    #[test]
    fn nested_objects_and_arrays_are_filtered() {
        let observed = map(json!({
            "name": "n",
            "unknown": 1,
            "settings": {"size": 2, "status": "ok"},
            "tags": [{"key": "k", "etag": "e"}],
            "labels": {"free": "form"}
        }));
        let filtered =
            filter_read_only(&doc(), &schema_ref("Thing"), &FieldNameMap::default(), &observed)
                .unwrap();
        assert_eq!(
            filtered,
            map(json!({
                "name": "n",
                "settings": {"size": 2},
                "tags": [{"key": "k"}],
                "labels": {"free": "form"}
            }))
        );
    }

    #[test]
    fn filters_by_api_name_on_engine_named_objects() {
        let names = FieldNameMap::from_pairs([("displayName", "display_name")]);
        let observed = map(json!({"displayName": "d", "createdAt": "t"}));
        let filtered = filter_read_only(&doc(), &schema_ref("Thing"), &names, &observed).unwrap();
        assert_eq!(filtered, map(json!({"displayName": "d"})));
    }

    #[test]
    fn discriminator_selects_variant() {
        let names = FieldNameMap::default();
        let dog = map(json!({"kind": "dog", "bark": "woof", "license": "L1", "meow": "?"}));
        let filtered = filter_read_only(&doc(), &schema_ref("Pet"), &names, &dog).unwrap();
        assert_eq!(filtered, map(json!({"kind": "dog", "bark": "woof"})));

        // No explicit mapping: the discriminant names the schema.
        let cat = map(json!({"kind": "Cat", "bark": "?", "meow": "purr"}));
        let filtered = filter_read_only(&doc(), &schema_ref("Pet"), &names, &cat).unwrap();
        assert_eq!(filtered, map(json!({"kind": "Cat", "meow": "purr"})));
    }

    #[test]
    fn reconcile_read_never_drops_recorded_keys() {
        let recorded = map(json!({"name": "n", "settings": {"size": 1}, "extra": true}));
        let observed = map(json!({"id": "x", "name": "m", "settings": {"size": 1}}));
        let result = reconcile_read(
            &doc(),
            Some(&schema_ref("Thing")),
            &FieldNameMap::default(),
            &observed,
            Some(&recorded),
        )
        .unwrap();
        assert_eq!(result, map(json!({"name": "m", "settings": {"size": 1}, "extra": true})));
    }

    #[test]
    fn reconcile_read_without_recorded_inputs() {
        let observed = map(json!({"id": "x", "createdAt": "2020-01-01", "name": "n"}));
        let result = reconcile_read(
            &doc(),
            Some(&schema_ref("Thing")),
            &FieldNameMap::default(),
            &observed,
            None,
        )
        .unwrap();
        assert_eq!(result, map(json!({"name": "n"})));
    }

    #[test]
    fn reconcile_outputs_overlays_without_deleting() {
        let prior = capture(&map(json!({"id": "1", "a": 1, "b": 2})), &PropertyMap::new());
        let fresh = map(json!({"a": 5, "c": 3}));
        assert_eq!(
            reconcile_outputs(&fresh, &prior),
            map(json!({"id": "1", "a": 5, "b": 2, "c": 3}))
        );
    }

    #[test]
    fn extract_id_top_level_and_nested() {
        assert_eq!(extract_id("t", &map(json!({"id": 42.0}))).unwrap(), "42");
        assert_eq!(extract_id("t", &map(json!({"key": {"id": "k1"}}))).unwrap(), "k1");
        assert!(matches!(
            extract_id("t", &map(json!({"name": "n"}))),
            Err(CoreError::MissingIdentifier { .. })
        ));
    }
}
