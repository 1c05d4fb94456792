//! Catalog metadata produced alongside the OpenAPI document: which endpoint
//! implements each lifecycle verb per resource type, and the name tables.

use crate::names::FieldNameMap;
use crate::openapi::HttpMethod;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path templates implementing each verb for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMap {
    /// Create (POST).
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    /// Read (GET).
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    /// Partial update (PATCH).
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    /// Full replace (PUT). Also usable as an upsert-style create.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,
    /// Delete (DELETE).
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl EndpointMap {
    /// Endpoint used to create an instance. PUT wins when it targets the same
    /// template as POST or when there is no POST.
    pub fn create_route(&self) -> Option<(&str, HttpMethod)> {
        match (self.create.as_deref(), self.replace.as_deref()) {
            (Some(c), Some(p)) if c == p => Some((p, HttpMethod::Put)),
            (Some(c), _) => Some((c, HttpMethod::Post)),
            (None, Some(p)) => Some((p, HttpMethod::Put)),
            (None, None) => None,
        }
    }

    /// Endpoint used to update an instance: PATCH when present, else PUT.
    pub fn update_route(&self) -> Option<(&str, HttpMethod)> {
        self.update
            .as_deref()
            .map(|u| (u, HttpMethod::Patch))
            .or_else(|| self.replace.as_deref().map(|p| (p, HttpMethod::Put)))
    }

    /// Without an update or replace endpoint, any input change forces replacement.
    pub fn is_replace_only(&self) -> bool {
        self.update.is_none() && self.replace.is_none()
    }
}

/// Catalog metadata for a whole provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    #[serde(default)]
    pub crud_map: BTreeMap<String, EndpointMap>,
    /// Type token to the property that receives a generated name.
    #[serde(default)]
    pub auto_name_map: BTreeMap<String, String>,
    #[serde(default)]
    pub sdk_to_api_name_map: BTreeMap<String, String>,
    #[serde(default)]
    pub api_to_sdk_name_map: BTreeMap<String, String>,
    /// Path parameter name to the property that supplies its value.
    #[serde(default)]
    pub path_param_name_map: BTreeMap<String, String>,
}

impl ProviderMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        serde_json::from_slice(bytes).map_err(|e| SchemaError::Metadata(e.to_string()))
    }

    pub fn names(&self) -> FieldNameMap {
        FieldNameMap::new(
            self.sdk_to_api_name_map.clone(),
            self.api_to_sdk_name_map.clone(),
        )
    }
}
