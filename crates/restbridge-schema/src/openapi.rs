//! Typed subset of an OpenAPI 3 document.
//!
//! Only the parts the provider consumes are modelled: servers, path items and
//! their operations, parameters, JSON request/response bodies, component
//! schemas, and security schemes. Unknown fields are ignored.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const JSON_MEDIA_TYPE: &str = "application/json";
const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const PARAMETER_REF_PREFIX: &str = "#/components/parameters/";
const REQUEST_BODY_REF_PREFIX: &str = "#/components/requestBodies/";
const MAX_REF_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Methods that carry a JSON body built from resource inputs.
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub openapi: String,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub get: Option<Operation>,
    pub post: Option<Operation>,
    pub put: Option<Operation>,
    pub patch: Option<Operation>,
    pub delete: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Schema>,
}

impl Parameter {
    pub fn is_path(&self) -> bool {
        self.location == "path"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub request_bodies: BTreeMap<String, RequestBody>,
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub scheme: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
}

/// `type` may be a single name or, in OpenAPI 3.1, a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    One(String),
    Many(Vec<String>),
}

impl SchemaType {
    pub fn allows(&self, name: &str) -> bool {
        match self {
            SchemaType::One(t) => t == name,
            SchemaType::Many(ts) => ts.iter().any(|t| t == name),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SchemaType>,
    #[serde(default)]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default)]
    pub required: Vec<String>,
    pub items: Option<Box<Schema>>,
    #[serde(default)]
    pub all_of: Vec<Schema>,
    #[serde(default)]
    pub one_of: Vec<Schema>,
    #[serde(default)]
    pub any_of: Vec<Schema>,
    pub discriminator: Option<Discriminator>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Vec<serde_json::Value>,
    pub default: Option<serde_json::Value>,
    pub format: Option<String>,
}

impl Schema {
    pub fn allows_type(&self, name: &str) -> bool {
        self.kind.as_ref().is_some_and(|k| k.allows(name))
    }

    pub fn is_composed(&self) -> bool {
        !self.all_of.is_empty() || !self.one_of.is_empty() || !self.any_of.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

/// How the API expects its credential to be attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthScheme {
    pub header: String,
    /// Scheme prefix such as `Bearer`; `None` when the raw value is sent.
    pub prefix: Option<String>,
}

impl Document {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        let doc: Document = serde_json::from_slice(bytes)
            .map_err(|e| SchemaError::Document(e.to_string()))?;
        if doc.paths.is_empty() {
            return Err(SchemaError::Document("document declares no paths".to_owned()));
        }
        Ok(doc)
    }

    /// URL of the first declared server, without a trailing slash.
    pub fn base_url(&self) -> Option<&str> {
        self.servers
            .first()
            .map(|s| s.url.trim_end_matches('/'))
    }

    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(path).and_then(|item| item.operation(method))
    }

    /// Follow `$ref` links until a concrete schema is reached.
    pub fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema, SchemaError> {
        let mut current = schema;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = current.reference.as_deref() else {
                return Ok(current);
            };
            let name = reference
                .strip_prefix(SCHEMA_REF_PREFIX)
                .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_owned()))?;
            current = self
                .components
                .schemas
                .get(name)
                .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_owned()))?;
        }
        Err(SchemaError::ReferenceCycle(
            schema.reference.clone().unwrap_or_default(),
        ))
    }

    fn resolve_parameter<'a>(&'a self, param: &'a Parameter) -> Result<&'a Parameter, SchemaError> {
        match param.reference.as_deref() {
            None => Ok(param),
            Some(reference) => reference
                .strip_prefix(PARAMETER_REF_PREFIX)
                .and_then(|name| self.components.parameters.get(name))
                .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_owned())),
        }
    }

    fn resolve_request_body<'a>(
        &'a self,
        body: &'a RequestBody,
    ) -> Result<&'a RequestBody, SchemaError> {
        match body.reference.as_deref() {
            None => Ok(body),
            Some(reference) => reference
                .strip_prefix(REQUEST_BODY_REF_PREFIX)
                .and_then(|name| self.components.request_bodies.get(name))
                .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_owned())),
        }
    }

    /// Parameters declared for an operation, path-item level first, with
    /// operation-level declarations overriding same-named path-item ones.
    pub fn parameters(
        &self,
        path: &str,
        method: HttpMethod,
    ) -> Result<Vec<&Parameter>, SchemaError> {
        let item = self
            .paths
            .get(path)
            .ok_or_else(|| SchemaError::UnknownPath(path.to_owned()))?;
        let op = item
            .operation(method)
            .ok_or_else(|| SchemaError::UnknownOperation {
                method: method.to_string(),
                path: path.to_owned(),
            })?;

        let mut params: Vec<&Parameter> = Vec::new();
        for raw in item.parameters.iter().chain(&op.parameters) {
            let param = self.resolve_parameter(raw)?;
            if let Some(existing) = params
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                *existing = param;
            } else {
                params.push(param);
            }
        }
        Ok(params)
    }

    /// Names of the `in: path` parameters of an operation, in declaration order.
    pub fn path_parameter_names(
        &self,
        path: &str,
        method: HttpMethod,
    ) -> Result<Vec<&str>, SchemaError> {
        Ok(self
            .parameters(path, method)?
            .into_iter()
            .filter(|p| p.is_path())
            .map(|p| p.name.as_str())
            .collect())
    }

    /// Resolved JSON request body schema of an operation, if it declares one.
    pub fn request_body_schema(
        &self,
        path: &str,
        method: HttpMethod,
    ) -> Result<Option<&Schema>, SchemaError> {
        let Some(body) = self
            .operation(path, method)
            .and_then(|op| op.request_body.as_ref())
        else {
            return Ok(None);
        };
        let body = self.resolve_request_body(body)?;
        let media = body
            .content
            .get(JSON_MEDIA_TYPE)
            .or_else(|| body.content.values().next());
        match media.and_then(|m| m.schema.as_ref()) {
            Some(schema) => self.resolve(schema).map(Some),
            None => Ok(None),
        }
    }

    /// Whether the operation's request body is mandatory.
    pub fn request_body_required(&self, path: &str, method: HttpMethod) -> bool {
        self.operation(path, method)
            .and_then(|op| op.request_body.as_ref())
            .and_then(|body| self.resolve_request_body(body).ok())
            .is_some_and(|body| body.required)
    }

    /// Resolved schema of the success response (`200`, then any `2XX`, then `default`).
    pub fn success_response_schema(
        &self,
        path: &str,
        method: HttpMethod,
    ) -> Result<Option<&Schema>, SchemaError> {
        let Some(op) = self.operation(path, method) else {
            return Ok(None);
        };
        let response = op
            .responses
            .get("200")
            .or_else(|| {
                op.responses
                    .iter()
                    .find(|(code, _)| code.starts_with('2'))
                    .map(|(_, r)| r)
            })
            .or_else(|| op.responses.get("default"));
        let schema = response.and_then(|r| {
            r.content
                .get(JSON_MEDIA_TYPE)
                .or_else(|| r.content.values().next())
                .and_then(|m| m.schema.as_ref())
        });
        match schema {
            Some(schema) => self.resolve(schema).map(Some),
            None => Ok(None),
        }
    }

    /// Properties of a schema with every `allOf` branch merged in.
    pub fn flatten_properties<'a>(
        &'a self,
        schema: &'a Schema,
    ) -> Result<BTreeMap<&'a str, &'a Schema>, SchemaError> {
        let mut out = BTreeMap::new();
        self.collect_properties(schema, &mut out, 0)?;
        Ok(out)
    }

    fn collect_properties<'a>(
        &'a self,
        schema: &'a Schema,
        out: &mut BTreeMap<&'a str, &'a Schema>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if depth > MAX_REF_DEPTH {
            return Err(SchemaError::ReferenceCycle(
                schema.reference.clone().unwrap_or_default(),
            ));
        }
        let schema = self.resolve(schema)?;
        for branch in &schema.all_of {
            self.collect_properties(branch, out, depth + 1)?;
        }
        for (name, prop) in &schema.properties {
            out.insert(name.as_str(), prop);
        }
        Ok(())
    }

    /// Required property names of a schema, including `allOf` branches.
    pub fn flatten_required<'a>(&'a self, schema: &'a Schema) -> Result<Vec<&'a str>, SchemaError> {
        let schema = self.resolve(schema)?;
        let mut required: Vec<&str> = schema.required.iter().map(String::as_str).collect();
        for branch in &schema.all_of {
            required.extend(self.flatten_required(branch)?);
        }
        required.sort_unstable();
        required.dedup();
        Ok(required)
    }

    /// Select the `oneOf` branch named by the discriminator value, either through
    /// the explicit mapping or by matching the referenced schema's name.
    pub fn discriminated_variant<'a>(
        &'a self,
        schema: &'a Schema,
        discriminant: &str,
    ) -> Result<Option<&'a Schema>, SchemaError> {
        let Some(discriminator) = schema.discriminator.as_ref() else {
            return Ok(None);
        };
        let target = discriminator
            .mapping
            .get(discriminant)
            .cloned()
            .unwrap_or_else(|| format!("{SCHEMA_REF_PREFIX}{discriminant}"));
        for branch in &schema.one_of {
            if branch.reference.as_deref() == Some(target.as_str()) {
                return self.resolve(branch).map(Some);
            }
        }
        Ok(None)
    }

    /// Credential header derived from the first declared security scheme.
    pub fn auth_scheme(&self) -> Option<AuthScheme> {
        let scheme = self.components.security_schemes.values().next()?;
        let header = match (&scheme.name, scheme.location.as_deref()) {
            (Some(name), Some("header") | None) if !name.is_empty() => name.clone(),
            _ => "Authorization".to_owned(),
        };
        let prefix = match scheme.scheme.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("bearer") => Some("Bearer".to_owned()),
            Some(s) if s.eq_ignore_ascii_case("basic") => Some("Basic".to_owned()),
            Some("") | None => None,
            Some(other) => Some(other.to_owned()),
        };
        Some(AuthScheme { header, prefix })
    }
}
