//! Data model for restbridge.
//!
//! This crate defines the property value model (`PropertyValue`) with its
//! engine wire codec, structural diffs between property maps (`ObjectDiff`),
//! the typed OpenAPI subset the provider reads (`Document`), catalog metadata
//! (`ProviderMetadata`, `EndpointMap`), and field-name translation
//! (`FieldNameMap`).

pub mod diff;
pub mod metadata;
pub mod names;
pub mod openapi;
pub mod types;
pub mod value;

pub use diff::{ObjectDiff, ValueDiff};
pub use metadata::{EndpointMap, ProviderMetadata};
pub use names::{Direction, FieldNameMap};
pub use openapi::{AuthScheme, Document, HttpMethod, Parameter, Schema, SecurityScheme};
pub use types::{ResourceUrn, TypeToken};
pub use value::{map_from_json, map_to_plain_json, maps_deep_eq, PropertyMap, PropertyValue};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid OpenAPI document: {0}")]
    Document(String),
    #[error("invalid provider metadata: {0}")]
    Metadata(String),
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("reference cycle through {0}")]
    ReferenceCycle(String),
    #[error("path not declared in document: {0}")]
    UnknownPath(String),
    #[error("no {method} operation declared for {path}")]
    UnknownOperation { method: String, path: String },
}
