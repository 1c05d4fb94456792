//! Pre-flight validation of a built request against its declared route.

use crate::CoreError;
use restbridge_remote::PreparedRequest;
use restbridge_schema::{Document, HttpMethod, Schema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Validate path values, JSON body and credential header of one request.
///
/// Absent top-level body properties whose schema declares a `default` are
/// filled in first, so the caller must re-serialize `body` afterwards.
pub fn validate_request(
    doc: &Document,
    type_token: &str,
    template: &str,
    method: HttpMethod,
    path_values: &BTreeMap<String, String>,
    body: Option<&mut Map<String, Value>>,
    request: &PreparedRequest,
) -> Result<(), CoreError> {
    let mut problems = Vec::new();

    for param in doc.parameters(template, method)? {
        if !param.is_path() {
            continue;
        }
        match path_values.get(&param.name).map(String::as_str) {
            None | Some("") => {
                problems.push(format!("path parameter '{}' is required", param.name));
            }
            Some(value) => {
                if let Some(schema) = param.schema.as_ref() {
                    check_path_value(doc, &param.name, schema, value, &mut problems);
                }
            }
        }
    }

    let body_schema = doc.request_body_schema(template, method)?;
    match (body_schema, body) {
        (Some(schema), Some(body)) => check_body(doc, schema, body, &mut problems)?,
        (Some(_), None) if doc.request_body_required(template, method) => {
            problems.push("request body is required".to_owned());
        }
        _ => {}
    }

    if let Some(scheme) = doc.auth_scheme() {
        match request.header(&scheme.header) {
            None | Some("") => problems.push(format!("missing {} header", scheme.header)),
            Some(value) => {
                if let Some(prefix) = scheme.prefix.as_deref() {
                    let matches = value.split_once(' ').is_some_and(|(p, rest)| {
                        p.eq_ignore_ascii_case(prefix) && !rest.is_empty()
                    });
                    if !matches {
                        problems.push(format!(
                            "{} header must use the {prefix} scheme",
                            scheme.header
                        ));
                    }
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        debug!("{method} {template} rejected: {problems:?}");
        Err(CoreError::RequestValidation {
            type_token: type_token.to_owned(),
            path: template.to_owned(),
            problems,
        })
    }
}

fn check_body(
    doc: &Document,
    schema: &Schema,
    body: &mut Map<String, Value>,
    problems: &mut Vec<String>,
) -> Result<(), CoreError> {
    let properties = doc.flatten_properties(schema)?;

    for (name, prop) in &properties {
        if body.get(*name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        if let Some(default) = doc.resolve(prop)?.default.clone() {
            body.insert((*name).to_owned(), default);
        }
    }

    for name in doc.flatten_required(schema)? {
        if !body.get(name).is_some_and(|v| !v.is_null()) {
            problems.push(format!("property '{name}' is required"));
        }
    }

    for (name, value) in body.iter() {
        let Some(prop) = properties.get(name.as_str()) else {
            continue;
        };
        let prop = doc.resolve(prop)?;
        if let Some(problem) = type_problem(name, prop, value) {
            problems.push(problem);
        } else if !prop.enum_values.is_empty() && !prop.enum_values.contains(value) {
            problems.push(format!("property '{name}' is not one of the allowed values"));
        }
    }
    Ok(())
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

fn type_problem(name: &str, schema: &Schema, value: &Value) -> Option<String> {
    let kind = schema.kind.as_ref()?;
    let ok = match value {
        Value::Null => schema.nullable || kind.allows("null"),
        Value::Bool(_) => kind.allows("boolean"),
        Value::Number(_) => kind.allows("number") || (kind.allows("integer") && is_integral(value)),
        Value::String(_) => kind.allows("string"),
        Value::Array(_) => kind.allows("array"),
        Value::Object(_) => kind.allows("object"),
    };
    (!ok).then(|| format!("property '{name}' has the wrong type, expected {kind:?}"))
}

fn check_path_value(
    doc: &Document,
    name: &str,
    schema: &Schema,
    value: &str,
    problems: &mut Vec<String>,
) {
    let Ok(schema) = doc.resolve(schema) else {
        return;
    };
    let typed = if schema.allows_type("integer") {
        value.parse::<i64>().ok().map(Value::from)
    } else if schema.allows_type("number") {
        value.parse::<f64>().ok().map(Value::from)
    } else if schema.allows_type("boolean") {
        value.parse::<bool>().ok().map(Value::from)
    } else {
        Some(Value::String(value.to_owned()))
    };
    let Some(typed) = typed else {
        problems.push(format!("path parameter '{name}' has the wrong type"));
        return;
    };
    if !schema.enum_values.is_empty() && !schema.enum_values.contains(&typed) {
        problems.push(format!("path parameter '{name}' is not one of the allowed values"));
    }
}
