use crate::catalog::Catalog;
use crate::diff::{self, DiffResult};
use crate::hooks::{DefaultHooks, HookContext, HookFlow, Outputs, ProviderHooks};
use crate::lifecycle::{validate_transition, ResourceState};
use crate::messages::{
    CheckFailure, CheckRequest, CheckResponse, ConfigureRequest, ConfigureResponse,
    CreateRequest, CreateResponse, DeleteRequest, DiffRequest, InvokeRequest, InvokeResponse,
    ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
use crate::params::{ParamSources, PathDefaults};
use crate::request::{RequestBuilder, RouteCall};
use crate::state;
use crate::CoreError;
use restbridge_remote::{
    CallContext, HttpConfig, HttpResponse, HttpTransport, PreparedRequest, Transport,
};
use restbridge_schema::{
    map_from_json, Direction, HttpMethod, PropertyMap, PropertyValue, ResourceUrn, TypeToken,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const CREATE_STATUSES: &[u16] = &[200, 201, 202];
const READ_STATUSES: &[u16] = &[200];
const UPDATE_STATUSES: &[u16] = &[200, 204];
const DELETE_STATUSES: &[u16] = &[200, 202, 204];
const AUTO_NAME_SUFFIX_LEN: usize = 7;

/// Drives one REST API through the engine's resource lifecycle.
///
/// `configure` takes `&mut self` and must complete before the provider is
/// shared; every other call takes `&self` and carries all per-instance state
/// in its request and response, so calls for different resources may run
/// concurrently.
pub struct Provider {
    name: String,
    catalog: Catalog,
    hooks: Box<dyn ProviderHooks>,
    transport: Box<dyn Transport>,
    base_url: String,
    credential: Option<String>,
    defaults: PathDefaults,
}

impl Provider {
    /// A provider named `name` (the package name used in configuration keys)
    /// with pass-through hooks and the default HTTP client.
    pub fn new(name: impl Into<String>, catalog: Catalog) -> Self {
        let base_url = catalog.document().base_url().unwrap_or_default().to_owned();
        Self {
            name: name.into(),
            catalog,
            hooks: Box::new(DefaultHooks),
            transport: Box::new(HttpTransport::default()),
            base_url,
            credential: None,
            defaults: PathDefaults::new(),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl ProviderHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    #[must_use]
    pub fn with_http_config(self, config: &HttpConfig) -> Self {
        self.with_transport(HttpTransport::new(config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn global_path_params(&self) -> &PathDefaults {
        &self.defaults
    }

    fn type_token(urn: &ResourceUrn) -> Result<TypeToken, CoreError> {
        urn.type_token()
            .ok_or_else(|| CoreError::UnknownResourceType(urn.to_string()))
    }

    fn env_prefix(&self) -> String {
        self.name.to_ascii_uppercase().replace('-', "_")
    }

    fn setting(&self, req: &ConfigureRequest, key: &str, env_suffix: &str) -> Option<String> {
        req.variables
            .get(&format!("{}:config:{key}", self.name))
            .cloned()
            .or_else(|| std::env::var(format!("{}_{env_suffix}", self.env_prefix())).ok())
            .filter(|v| !v.is_empty())
    }

    /// Apply credential and host overrides, then load the global path defaults.
    pub fn configure(&mut self, req: &ConfigureRequest) -> Result<ConfigureResponse, CoreError> {
        if let Some(resp) = self.hooks.on_configure(req)? {
            debug!("configuration handled by hook");
            return Ok(resp);
        }

        if let Some(key) = self.setting(req, "apiKey", "API_KEY") {
            self.credential = Some(key);
        }
        if let Some(host) = self.setting(req, "apiHost", "API_HOST") {
            let host = if host.contains("://") {
                host
            } else {
                format!("http://{host}")
            };
            let path = server_path(self.catalog.document().base_url().unwrap_or_default());
            self.base_url = format!("{}{path}", host.trim_end_matches('/'));
            info!("{}: using API host {}", self.name, self.base_url);
        }
        self.defaults = self.hooks.global_path_params(req)?;

        Ok(ConfigureResponse {
            accept_secrets: true,
            supports_preview: false,
        })
    }

    /// Return the proposed inputs, filling a generated name where the type
    /// declares one and reporting missing required create properties.
    pub fn check(&self, req: &CheckRequest) -> Result<CheckResponse, CoreError> {
        let token = Self::type_token(&req.urn)?;
        let endpoints = self.catalog.endpoints(&token)?;
        let mut inputs = req.news.clone();

        if let Some(property) = self.catalog.auto_name_property(&token) {
            if !inputs.get(property).is_some_and(PropertyValue::has_value) {
                let name = auto_name(&req.urn, &req.random_seed);
                debug!("{token}: generated {property} = {name}");
                inputs.insert(property.to_owned(), PropertyValue::String(name));
            }
        }

        let mut failures = Vec::new();
        if endpoints.create_route().is_some() {
            if let Some(schema) = self.catalog.create_body_schema(&token)? {
                let params = self.catalog.create_param_properties(&token)?;
                let names = self.catalog.names();
                for required in self.catalog.document().flatten_required(schema)? {
                    let property = names.to_sdk(required);
                    if params.contains(&property) || params.contains(&required) {
                        continue;
                    }
                    if !inputs.get(property).is_some_and(PropertyValue::has_value) {
                        failures.push(CheckFailure {
                            property: property.to_owned(),
                            reason: format!("missing required property '{property}'"),
                        });
                    }
                }
            }
        }

        Ok(CheckResponse { inputs, failures })
    }

    /// Classify the change from the recorded inputs to `news`.
    pub fn diff(&self, req: &DiffRequest) -> Result<DiffResult, CoreError> {
        let token = Self::type_token(&req.urn)?;
        let olds = state::recall(&req.olds).ok_or_else(|| CoreError::MissingRecordedInputs {
            type_token: token.to_string(),
        })?;

        let structural = diff::structural(&olds, &req.news);
        if !structural.any_changes() {
            debug!("{}: no changes", req.urn);
            return Ok(DiffResult::no_changes());
        }

        let ctx = HookContext {
            type_token: &token,
            urn: Some(&req.urn),
            id: Some(&req.id),
        };
        if let Some(result) = self.hooks.on_diff(&ctx, req, &structural)? {
            return Ok(result);
        }

        let endpoints = self.catalog.endpoints(&token)?;
        let create_params = match self.catalog.create_param_properties(&token) {
            Ok(params) => params,
            Err(CoreError::MissingEndpoint { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        let updatable: Option<BTreeSet<&str>> = if endpoints.is_replace_only() {
            None
        } else {
            let names = self.catalog.names();
            match self.catalog.update_body_schema(&token)? {
                Some(schema) => Some(
                    self.catalog
                        .document()
                        .flatten_properties(schema)?
                        .into_keys()
                        .map(|k| names.to_sdk(k))
                        .collect(),
                ),
                None => Some(BTreeSet::new()),
            }
        };

        let result = diff::classify(&structural, endpoints, &create_params, updatable.as_ref());
        debug!(
            "{}: diffs {:?}, replaces {:?}",
            req.urn, result.diffs, result.replaces
        );
        Ok(result)
    }

    pub fn create(
        &self,
        req: &CreateRequest,
        call: &CallContext,
    ) -> Result<CreateResponse, CoreError> {
        let token = Self::type_token(&req.urn)?;
        transition(&req.urn, ResourceState::Unmanaged, ResourceState::PendingCreate)?;
        let (template, method) = self.catalog.create_route(&token)?;

        let authorization = self.authorization();
        let mut request = self.builder(authorization.as_deref()).build(RouteCall {
            type_token: &token,
            template,
            method,
            body: Some(&req.properties),
            sources: ParamSources::new(&req.properties),
        })?;

        let ctx = HookContext {
            type_token: &token,
            urn: Some(&req.urn),
            id: None,
        };
        let flow = self.hooks.on_pre_create(&ctx, &req.properties, &mut request)?;
        let response = self.exchange(flow, &request, call)?;
        expect_status(&token, &request, &response, CREATE_STATUSES)?;

        let outputs = self.decode(&token, &response)?;
        let outputs = self.hooks.on_post_create(&ctx, outputs)?;
        let id = state::extract_id(&token, &outputs)?;
        transition(&req.urn, ResourceState::PendingCreate, ResourceState::Active)?;
        info!("{}: created {id}", req.urn);

        Ok(CreateResponse {
            id,
            properties: state::capture(&outputs, &req.properties),
        })
    }

    /// Refresh from the API. Without persisted state the declared inputs are
    /// used instead, and an identifier of the form `a/b/c` is spread over the
    /// read endpoint's path parameters with the last segment as the id.
    pub fn read(&self, req: &ReadRequest, call: &CallContext) -> Result<ReadResponse, CoreError> {
        let token = Self::type_token(&req.urn)?;
        let from = ResourceState::of_persisted(&req.properties);
        transition(&req.urn, from, ResourceState::Active)?;
        let template = self.catalog.read_route(&token)?;

        let mut old_state = if req.properties.is_empty() {
            debug!("{}: no persisted state, reading from declared inputs", req.urn);
            req.inputs.clone()
        } else {
            req.properties.clone()
        };
        let mut id = req.id.clone();
        if req.properties.is_empty() {
            if let Some(last) = self.spread_import_id(template, &req.id, &mut old_state)? {
                id = last;
            }
        }
        if !old_state.get("id").is_some_and(PropertyValue::has_value) {
            old_state.insert("id".to_owned(), PropertyValue::String(id.clone()));
        }
        let recorded = state::recall(&old_state);

        let authorization = self.authorization();
        let mut request = self.builder(authorization.as_deref()).build(RouteCall {
            type_token: &token,
            template,
            method: HttpMethod::Get,
            body: None,
            sources: ParamSources::new(&old_state)
                .with_recorded_inputs(recorded.as_ref())
                .with_id(Some(&id)),
        })?;

        let ctx = HookContext {
            type_token: &token,
            urn: Some(&req.urn),
            id: Some(&id),
        };
        let flow = self.hooks.on_pre_read(&ctx, &mut request)?;
        let response = self.exchange(flow, &request, call)?;
        expect_status(&token, &request, &response, READ_STATUSES)?;

        let outputs = self.decode(&token, &response)?;
        let outputs = self.hooks.on_post_read(&ctx, outputs)?;

        let create_schema = match self.catalog.create_route(&token) {
            Ok(_) => self.catalog.create_body_schema(&token)?,
            Err(_) => None,
        };
        let inputs = state::reconcile_read(
            self.catalog.document(),
            create_schema,
            self.catalog.names(),
            &outputs,
            recorded.as_ref(),
        )?;
        let id = state::extract_id(&token, &outputs)?;

        // Earlier outputs the API no longer returns are kept.
        let outputs = if req.properties.is_empty() {
            outputs
        } else {
            state::reconcile_outputs(&outputs, &req.properties)
        };
        // A refresh leaves the recorded inputs alone; only a first read seeds them.
        let slot = recorded.as_ref().unwrap_or(&inputs);
        Ok(ReadResponse {
            id,
            properties: state::capture(&outputs, slot),
            inputs,
        })
    }

    pub fn update(
        &self,
        req: &UpdateRequest,
        call: &CallContext,
    ) -> Result<UpdateResponse, CoreError> {
        let token = Self::type_token(&req.urn)?;
        let from = ResourceState::of_persisted(&req.olds);
        transition(&req.urn, from, ResourceState::PendingUpdate)?;
        let (template, method) = self.catalog.update_route(&token)?;

        let recorded = state::recall(&req.olds);
        let mut known = state::outputs_of(&req.olds);
        known.extend(req.news.iter().map(|(k, v)| (k.clone(), v.clone())));

        let authorization = self.authorization();
        let mut request = self.builder(authorization.as_deref()).build(RouteCall {
            type_token: &token,
            template,
            method,
            body: Some(&req.news),
            sources: ParamSources::new(&known)
                .with_recorded_inputs(recorded.as_ref())
                .with_id(Some(&req.id)),
        })?;

        let ctx = HookContext {
            type_token: &token,
            urn: Some(&req.urn),
            id: Some(&req.id),
        };
        let flow = self.hooks.on_pre_update(&ctx, &req.news, &mut request)?;
        let response = self.exchange(flow, &request, call)?;
        expect_status(&token, &request, &response, UPDATE_STATUSES)?;

        let outputs = if response.status == 204 {
            debug!("{}: update returned no content, keeping prior outputs", req.urn);
            state::outputs_of(&req.olds)
        } else {
            let fresh = self.decode(&token, &response)?;
            let fresh = self.hooks.on_post_update(&ctx, fresh)?;
            state::reconcile_outputs(&fresh, &req.olds)
        };
        transition(&req.urn, ResourceState::PendingUpdate, ResourceState::Active)?;
        info!("{}: updated {}", req.urn, req.id);

        Ok(UpdateResponse {
            properties: state::capture(&outputs, &req.news),
        })
    }

    pub fn delete(&self, req: &DeleteRequest, call: &CallContext) -> Result<(), CoreError> {
        let token = Self::type_token(&req.urn)?;
        let from = ResourceState::of_persisted(&req.properties);
        transition(&req.urn, from, ResourceState::PendingDelete)?;
        let Some(template) = self.catalog.delete_route(&token)? else {
            debug!("{}: no delete endpoint, dropping from state", req.urn);
            return transition(&req.urn, ResourceState::PendingDelete, ResourceState::Gone);
        };

        let recorded = state::recall(&req.properties);
        let known = state::outputs_of(&req.properties);
        let authorization = self.authorization();
        let mut request = self.builder(authorization.as_deref()).build(RouteCall {
            type_token: &token,
            template,
            method: HttpMethod::Delete,
            body: None,
            sources: ParamSources::new(&known)
                .with_recorded_inputs(recorded.as_ref())
                .with_id(Some(&req.id)),
        })?;

        let ctx = HookContext {
            type_token: &token,
            urn: Some(&req.urn),
            id: Some(&req.id),
        };
        let flow = self.hooks.on_pre_delete(&ctx, &mut request)?;
        let response = self.exchange(flow, &request, call)?;
        expect_status(&token, &request, &response, DELETE_STATUSES)?;
        self.hooks.on_post_delete(&ctx)?;

        transition(&req.urn, ResourceState::PendingDelete, ResourceState::Gone)?;
        info!("{}: deleted {}", req.urn, req.id);
        Ok(())
    }

    /// Read-only call addressed by type token, served by the read endpoint.
    pub fn invoke(
        &self,
        req: &InvokeRequest,
        call: &CallContext,
    ) -> Result<InvokeResponse, CoreError> {
        let token = req.token.as_str();
        let template = self.catalog.read_route(token)?;

        let authorization = self.authorization();
        let mut request = self.builder(authorization.as_deref()).build(RouteCall {
            type_token: token,
            template,
            method: HttpMethod::Get,
            body: None,
            sources: ParamSources::new(&req.args),
        })?;

        let ctx = HookContext {
            type_token: token,
            urn: None,
            id: None,
        };
        let flow = self.hooks.on_pre_invoke(&ctx, &req.args, &mut request)?;
        let response = self.exchange(flow, &request, call)?;
        expect_status(token, &request, &response, READ_STATUSES)?;

        let outputs = self.decode(token, &response)?;
        if self.catalog.read_returns_list(token)? && matches!(outputs, Outputs::Object(_)) {
            warn!("{token}: declared a list response but received an object");
        }
        Ok(InvokeResponse {
            outputs: self.hooks.on_post_invoke(&ctx, outputs)?,
        })
    }

    fn authorization(&self) -> Option<String> {
        self.hooks.authorization(self.credential.as_deref())
    }

    fn builder<'a>(&'a self, authorization: Option<&'a str>) -> RequestBuilder<'a> {
        RequestBuilder::new(&self.catalog, &self.base_url, authorization, &self.defaults)
    }

    fn exchange(
        &self,
        flow: HookFlow,
        request: &PreparedRequest,
        call: &CallContext,
    ) -> Result<HttpResponse, CoreError> {
        match flow {
            HookFlow::Continue => Ok(self.transport.send(request, call)?),
            HookFlow::Respond(response) => {
                debug!("{} {} answered by hook", request.method, request.url);
                Ok(response)
            }
        }
    }

    /// Parse a response body and translate its names to the engine side.
    fn decode(&self, type_token: &str, response: &HttpResponse) -> Result<Outputs, CoreError> {
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Outputs::Object(PropertyMap::new()));
        }
        let value: serde_json::Value =
            serde_json::from_slice(&response.body).map_err(|e| CoreError::ResponseDecode {
                type_token: type_token.to_owned(),
                message: e.to_string(),
            })?;
        let names = self.catalog.names();
        match value {
            serde_json::Value::Array(items) => Ok(Outputs::List(
                items
                    .into_iter()
                    .map(|item| names.translate(&PropertyValue::from(item), Direction::ToSdk))
                    .collect(),
            )),
            object @ serde_json::Value::Object(_) => {
                let map = map_from_json(object).unwrap_or_default();
                Ok(Outputs::Object(names.translate_map(&map, Direction::ToSdk)))
            }
            other => Err(CoreError::ResponseDecode {
                type_token: type_token.to_owned(),
                message: format!("expected an object or array, got {other}"),
            }),
        }
    }

    /// Spread a slash-delimited import id over the read endpoint's path
    /// parameters. Returns the last segment when the id was spread.
    fn spread_import_id(
        &self,
        template: &str,
        id: &str,
        old_state: &mut PropertyMap,
    ) -> Result<Option<String>, CoreError> {
        let segments: Vec<&str> = id.trim_start_matches('/').split('/').collect();
        if segments.len() < 2 {
            return Ok(None);
        }
        let params = self
            .catalog
            .document()
            .path_parameter_names(template, HttpMethod::Get)?;
        if params.len() != segments.len() {
            debug!(
                "import id has {} segments but {template} has {} path parameters",
                segments.len(),
                params.len()
            );
            return Ok(None);
        }
        for (param, segment) in params.iter().zip(&segments) {
            let property = self.catalog.param_property_name(param);
            old_state
                .entry(property.to_owned())
                .or_insert_with(|| PropertyValue::string(*segment));
        }
        Ok(segments.last().map(|s| (*s).to_owned()))
    }
}

fn transition(urn: &ResourceUrn, from: ResourceState, to: ResourceState) -> Result<(), CoreError> {
    validate_transition(from, to)?;
    debug!("{urn}: {from} -> {to}");
    Ok(())
}

fn expect_status(
    type_token: &str,
    request: &PreparedRequest,
    response: &HttpResponse,
    accepted: &[u16],
) -> Result<(), CoreError> {
    if accepted.contains(&response.status) {
        return Ok(());
    }
    warn!(
        "{type_token}: {} {} returned {}",
        request.method, request.url, response.status
    );
    Err(CoreError::UpstreamHttp {
        type_token: type_token.to_owned(),
        method: request.method.to_string(),
        path: request.url.clone(),
        status: response.status,
        body: response.body_text(),
    })
}

/// Path part of a server URL, e.g. `/v2` for `https://api.example.com/v2`.
fn server_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("", |i| rest[i..].trim_end_matches('/'))
}

/// `<resource name>-<7 hex chars>`, derived from the engine's seed and the URN.
fn auto_name(urn: &ResourceUrn, seed: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed);
    hasher.update(urn.as_str().as_bytes());
    let hex = hasher.finalize().to_hex();
    let base = urn.name().unwrap_or("resource");
    format!("{base}-{}", &hex.as_str()[..AUTO_NAME_SUFFIX_LEN])
}
