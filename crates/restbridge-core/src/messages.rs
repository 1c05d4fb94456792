//! Request and response shapes of the lifecycle calls.
//!
//! Property maps serialize in the engine's wire format, so these messages can
//! be carried over any JSON-based RPC surface unchanged.

use restbridge_schema::{PropertyMap, ResourceUrn, TypeToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    /// Provider configuration, keyed `<provider>:config:<name>`.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub args: PropertyMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureResponse {
    pub accept_secrets: bool,
    pub supports_preview: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub urn: ResourceUrn,
    #[serde(default)]
    pub olds: PropertyMap,
    #[serde(default)]
    pub news: PropertyMap,
    /// Engine-supplied entropy for generated names; stable across previews.
    #[serde(default)]
    pub random_seed: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub inputs: PropertyMap,
    pub failures: Vec<CheckFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    pub urn: ResourceUrn,
    pub id: String,
    /// Persisted state, including the recorded inputs.
    pub olds: PropertyMap,
    pub news: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub urn: ResourceUrn,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub urn: ResourceUrn,
    pub id: String,
    /// Persisted state; empty for stateless refreshes and imports.
    #[serde(default)]
    pub properties: PropertyMap,
    /// Declared inputs, used when there is no persisted state.
    #[serde(default)]
    pub inputs: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub id: String,
    pub properties: PropertyMap,
    pub inputs: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub urn: ResourceUrn,
    pub id: String,
    pub olds: PropertyMap,
    pub news: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub urn: ResourceUrn,
    pub id: String,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub token: TypeToken,
    #[serde(default)]
    pub args: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub outputs: PropertyMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use restbridge_schema::PropertyValue;
    use serde_json::json;

    #[test]
    fn create_request_reads_wire_format() {
        let raw = json!({
            "urn": "urn:pulumi:dev::proj::a:b:C::res",
            "properties": {
                "name": "n",
                "password": {"4dabf18193072939515e22adb298388d": "1b47061264138c4ac30d75fd1eb44270", "value": "p"}
            }
        });
        let req: CreateRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.urn.type_token().unwrap(), "a:b:C");
        assert!(req.properties["password"].is_secret());
        assert_eq!(req.properties["name"], PropertyValue::from("n"));
    }

    #[test]
    fn read_request_defaults_to_empty_state() {
        let req: ReadRequest = serde_json::from_value(json!({
            "urn": "urn:pulumi:dev::proj::a:b:C::res",
            "id": "x"
        }))
        .unwrap();
        assert!(req.properties.is_empty());
        assert!(req.inputs.is_empty());
    }
}
