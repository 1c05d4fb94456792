//! Lifecycle orchestration for REST-backed resources.
//!
//! This crate ties the OpenAPI catalog, path-parameter resolution, request
//! building and validation, diff classification, and state reconciliation
//! together into the `Provider`, the object the declarative engine drives
//! through configure, check, diff, create, read, update, delete and invoke.

pub mod catalog;
pub mod diff;
pub mod hooks;
pub mod lifecycle;
pub mod messages;
pub mod params;
pub mod provider;
pub mod request;
pub mod state;
pub mod validate;

pub use catalog::Catalog;
pub use diff::{DiffChanges, DiffKind, DiffResult, PropertyDiff};
pub use hooks::{DefaultHooks, HookContext, HookError, HookFlow, Outputs, ProviderHooks};
pub use lifecycle::{validate_transition, ResourceState};
pub use messages::{
    CheckFailure, CheckRequest, CheckResponse, ConfigureRequest, ConfigureResponse,
    CreateRequest, CreateResponse, DeleteRequest, DiffRequest, InvokeRequest, InvokeResponse,
    ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
pub use params::PathDefaults;
pub use provider::Provider;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown resource type {0}")]
    UnknownResourceType(String),
    #[error("{type_token} has no {operation} endpoint")]
    MissingEndpoint {
        type_token: String,
        operation: &'static str,
    },
    #[error("{type_token}: no value for path parameter '{name}' of {path}")]
    MissingPathParameter {
        type_token: String,
        path: String,
        name: String,
    },
    #[error("{type_token}: request validation failed for {path}: {}", .problems.join("; "))]
    RequestValidation {
        type_token: String,
        path: String,
        problems: Vec<String>,
    },
    #[error("{type_token}: {method} {path} returned HTTP {status}: {body}")]
    UpstreamHttp {
        type_token: String,
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    #[error("{type_token}: could not decode response: {message}")]
    ResponseDecode { type_token: String, message: String },
    #[error("{type_token}: persisted state has no recorded inputs")]
    MissingRecordedInputs { type_token: String },
    #[error("{type_token}: response carries no identifier")]
    MissingIdentifier { type_token: String },
    #[error("hook error: {0}")]
    Hook(#[from] HookError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("remote error: {0}")]
    Remote(#[from] restbridge_remote::RemoteError),
    #[error("schema error: {0}")]
    Schema(#[from] restbridge_schema::SchemaError),
}
