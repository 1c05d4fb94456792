use crate::CoreError;
use restbridge_schema::{
    Document, EndpointMap, FieldNameMap, HttpMethod, ProviderMetadata, Schema,
};
use tracing::debug;

/// The interface catalog: OpenAPI document plus per-type endpoint metadata.
///
/// Built once and shared read-only by every lifecycle call.
#[derive(Debug, Clone)]
pub struct Catalog {
    document: Document,
    metadata: ProviderMetadata,
    names: FieldNameMap,
}

impl Catalog {
    /// Check that every resource type declares a read endpoint and that every
    /// declared template exists in the document with the matching method.
    pub fn new(document: Document, metadata: ProviderMetadata) -> Result<Self, CoreError> {
        for (token, endpoints) in &metadata.crud_map {
            let Some(read) = endpoints.read.as_deref() else {
                return Err(CoreError::Configuration(format!(
                    "{token} declares no read endpoint"
                )));
            };
            let declared = [
                (endpoints.create.as_deref(), HttpMethod::Post),
                (Some(read), HttpMethod::Get),
                (endpoints.update.as_deref(), HttpMethod::Patch),
                (endpoints.replace.as_deref(), HttpMethod::Put),
                (endpoints.delete.as_deref(), HttpMethod::Delete),
            ];
            for (template, method) in declared {
                let Some(template) = template else { continue };
                if document.operation(template, method).is_none() {
                    return Err(CoreError::Configuration(format!(
                        "{token}: document has no {method} operation for {template}"
                    )));
                }
            }
        }
        let names = metadata.names();
        debug!(
            "catalog loaded: {} resource types, {} paths",
            metadata.crud_map.len(),
            document.paths.len()
        );
        Ok(Self {
            document,
            metadata,
            names,
        })
    }

    pub fn from_slices(openapi: &[u8], metadata: &[u8]) -> Result<Self, CoreError> {
        let document = Document::from_slice(openapi)?;
        let metadata = ProviderMetadata::from_slice(metadata)?;
        Self::new(document, metadata)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn names(&self) -> &FieldNameMap {
        &self.names
    }

    pub fn type_tokens(&self) -> impl Iterator<Item = &str> {
        self.metadata.crud_map.keys().map(String::as_str)
    }

    pub fn endpoints(&self, type_token: &str) -> Result<&EndpointMap, CoreError> {
        self.metadata
            .crud_map
            .get(type_token)
            .ok_or_else(|| CoreError::UnknownResourceType(type_token.to_owned()))
    }

    pub fn auto_name_property(&self, type_token: &str) -> Option<&str> {
        self.metadata
            .auto_name_map
            .get(type_token)
            .map(String::as_str)
    }

    /// Property name that supplies a path parameter: the catalog override when
    /// declared, else the translated name.
    pub fn param_property_name<'a>(&'a self, param: &'a str) -> &'a str {
        self.metadata
            .path_param_name_map
            .get(param)
            .map_or_else(|| self.names.to_sdk(param), String::as_str)
    }

    pub fn create_route(&self, type_token: &str) -> Result<(&str, HttpMethod), CoreError> {
        self.endpoints(type_token)?
            .create_route()
            .ok_or_else(|| CoreError::MissingEndpoint {
                type_token: type_token.to_owned(),
                operation: "create",
            })
    }

    pub fn read_route(&self, type_token: &str) -> Result<&str, CoreError> {
        self.endpoints(type_token)?
            .read
            .as_deref()
            .ok_or_else(|| CoreError::MissingEndpoint {
                type_token: type_token.to_owned(),
                operation: "read",
            })
    }

    pub fn update_route(&self, type_token: &str) -> Result<(&str, HttpMethod), CoreError> {
        self.endpoints(type_token)?
            .update_route()
            .ok_or_else(|| CoreError::MissingEndpoint {
                type_token: type_token.to_owned(),
                operation: "update",
            })
    }

    pub fn delete_route(&self, type_token: &str) -> Result<Option<&str>, CoreError> {
        Ok(self.endpoints(type_token)?.delete.as_deref())
    }

    /// Request body schema of the create operation, if it declares one.
    pub fn create_body_schema(&self, type_token: &str) -> Result<Option<&Schema>, CoreError> {
        let (template, method) = self.create_route(type_token)?;
        Ok(self.document.request_body_schema(template, method)?)
    }

    /// Request body schema of the update operation (PATCH, else PUT).
    pub fn update_body_schema(&self, type_token: &str) -> Result<Option<&Schema>, CoreError> {
        let (template, method) = self.update_route(type_token)?;
        Ok(self.document.request_body_schema(template, method)?)
    }

    /// Property names (engine side) of the create endpoint's path parameters.
    pub fn create_param_properties(&self, type_token: &str) -> Result<Vec<&str>, CoreError> {
        let (template, method) = self.create_route(type_token)?;
        Ok(self
            .document
            .path_parameter_names(template, method)?
            .into_iter()
            .map(|p| self.param_property_name(p))
            .collect())
    }

    /// Whether the read endpoint is declared to return a collection.
    pub fn read_returns_list(&self, type_token: &str) -> Result<bool, CoreError> {
        let template = self.read_route(type_token)?;
        Ok(self
            .document
            .success_response_schema(template, HttpMethod::Get)?
            .is_some_and(|s| s.allows_type("array")))
    }
}
