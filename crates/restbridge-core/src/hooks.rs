//! Extension points for API-specific behaviour.
//!
//! Every method has a pass-through default, so an implementation only
//! overrides what its API needs.

use crate::diff::DiffResult;
use crate::messages::{ConfigureRequest, ConfigureResponse, DiffRequest};
use crate::params::PathDefaults;
use restbridge_remote::{HttpResponse, PreparedRequest};
use restbridge_schema::{ObjectDiff, PropertyMap, PropertyValue, ResourceUrn};
use thiserror::Error;

/// Failure raised by a hook. Surfaced to the engine unchanged.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a pre-request hook wants done with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFlow {
    /// Send the (possibly modified) request.
    Continue,
    /// Skip the exchange and treat this as the response.
    Respond(HttpResponse),
}

/// A decoded response body: an object, or a collection of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Outputs {
    Object(PropertyMap),
    List(Vec<PropertyValue>),
}

impl Outputs {
    pub fn into_object(self) -> Option<PropertyMap> {
        match self {
            Outputs::Object(map) => Some(map),
            Outputs::List(_) => None,
        }
    }

    /// Objects pass through; a list is wrapped as `{"items": [...]}`.
    pub fn into_enveloped(self) -> PropertyMap {
        match self {
            Outputs::Object(map) => map,
            Outputs::List(items) => {
                let mut map = PropertyMap::new();
                map.insert("items".to_owned(), PropertyValue::Array(items));
                map
            }
        }
    }
}

/// The resource a hook is being called for.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub type_token: &'a str,
    pub urn: Option<&'a ResourceUrn>,
    pub id: Option<&'a str>,
}

fn expect_object(ctx: &HookContext<'_>, outputs: Outputs) -> Result<PropertyMap, HookError> {
    outputs
        .into_object()
        .ok_or_else(|| HookError::new(format!("{}: expected an object response", ctx.type_token)))
}

pub trait ProviderHooks: Send + Sync {
    /// Value for the credential header, without the scheme prefix.
    fn authorization(&self, credential: Option<&str>) -> Option<String> {
        credential.map(str::to_owned)
    }

    /// Returning a response replaces the default configuration entirely.
    fn on_configure(
        &self,
        _req: &ConfigureRequest,
    ) -> Result<Option<ConfigureResponse>, HookError> {
        Ok(None)
    }

    /// Provider-wide path-parameter values, read once during configuration.
    fn global_path_params(&self, _req: &ConfigureRequest) -> Result<PathDefaults, HookError> {
        Ok(PathDefaults::new())
    }

    /// Runs after a structural change was found; a returned result is final.
    fn on_diff(
        &self,
        _ctx: &HookContext<'_>,
        _req: &DiffRequest,
        _diff: &ObjectDiff,
    ) -> Result<Option<DiffResult>, HookError> {
        Ok(None)
    }

    fn on_pre_create(
        &self,
        _ctx: &HookContext<'_>,
        _inputs: &PropertyMap,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        Ok(HookFlow::Continue)
    }

    fn on_post_create(
        &self,
        ctx: &HookContext<'_>,
        outputs: Outputs,
    ) -> Result<PropertyMap, HookError> {
        expect_object(ctx, outputs)
    }

    fn on_pre_read(
        &self,
        _ctx: &HookContext<'_>,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        Ok(HookFlow::Continue)
    }

    fn on_post_read(
        &self,
        ctx: &HookContext<'_>,
        outputs: Outputs,
    ) -> Result<PropertyMap, HookError> {
        expect_object(ctx, outputs)
    }

    fn on_pre_update(
        &self,
        _ctx: &HookContext<'_>,
        _news: &PropertyMap,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        Ok(HookFlow::Continue)
    }

    fn on_post_update(
        &self,
        ctx: &HookContext<'_>,
        outputs: Outputs,
    ) -> Result<PropertyMap, HookError> {
        expect_object(ctx, outputs)
    }

    fn on_pre_delete(
        &self,
        _ctx: &HookContext<'_>,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        Ok(HookFlow::Continue)
    }

    fn on_post_delete(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    fn on_pre_invoke(
        &self,
        _ctx: &HookContext<'_>,
        _args: &PropertyMap,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        Ok(HookFlow::Continue)
    }

    fn on_post_invoke(
        &self,
        _ctx: &HookContext<'_>,
        outputs: Outputs,
    ) -> Result<PropertyMap, HookError> {
        Ok(outputs.into_enveloped())
    }
}

/// Pass-through hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ProviderHooks for DefaultHooks {}
