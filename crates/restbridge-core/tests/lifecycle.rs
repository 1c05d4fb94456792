//! Full lifecycle calls against an in-process `restbridge-server`.
//!
//! Each test starts its own server, points a `demo` provider at it through
//! configuration, and asserts both the provider's results and the requests
//! the API actually received.

use restbridge_core::state::recall;
use restbridge_core::{
    Catalog, CheckRequest, ConfigureRequest, ConfigureResponse, CoreError, CreateRequest,
    DeleteRequest, DiffChanges, DiffRequest, HookContext, HookError, HookFlow, InvokeRequest,
    PathDefaults, Provider, ProviderHooks, ReadRequest, UpdateRequest,
};
use restbridge_remote::{CallContext, HttpResponse, PreparedRequest, RemoteError};
use restbridge_schema::{map_from_json, PropertyMap, PropertyValue, ResourceUrn, TypeToken};
use restbridge_server::{ScriptedResponse, TestServer};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const OPENAPI: &[u8] = include_bytes!("fixtures/demo-openapi.json");
const METADATA: &[u8] = include_bytes!("fixtures/demo-metadata.json");

const THING: &str = "demo:things:Thing";
const KEY: &str = "demo:tailnet:Key";
const TOKEN: &str = "demo:users:ApiToken";
const NOTE: &str = "demo:notes:Note";

fn catalog() -> Catalog {
    Catalog::from_slices(OPENAPI, METADATA).unwrap()
}

fn variables(server: &TestServer) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();
    variables.insert("demo:config:apiHost".to_owned(), server.url.clone());
    variables.insert("demo:config:apiKey".to_owned(), "t0ken".to_owned());
    variables
}

fn configured(mut provider: Provider, server: &TestServer) -> Provider {
    provider
        .configure(&ConfigureRequest {
            variables: variables(server),
            ..ConfigureRequest::default()
        })
        .unwrap();
    provider
}

fn provider(server: &TestServer) -> Provider {
    configured(Provider::new("demo", catalog()), server)
}

fn urn(token: &str, name: &str) -> ResourceUrn {
    ResourceUrn::compose("dev", "proj", token, name)
}

fn props(v: Value) -> PropertyMap {
    map_from_json(v).unwrap()
}

fn call() -> CallContext {
    CallContext::new()
}

fn create(provider: &Provider, token: &str, properties: Value) -> restbridge_core::CreateResponse {
    provider
        .create(
            &CreateRequest {
                urn: urn(token, "res"),
                properties: props(properties),
            },
            &call(),
        )
        .unwrap()
}

#[test]
fn thing_create_read_diff_update_delete() {
    let server = TestServer::start();
    let provider = provider(&server);
    let inputs = json!({"name": "alpha", "displayName": "Alpha", "tags": ["a"]});

    let created = create(&provider, THING, inputs.clone());
    assert_eq!(created.id, "res-1");
    assert_eq!(created.properties["displayName"], PropertyValue::from("Alpha"));
    assert!(created.properties.contains_key("createdAt"));
    assert_eq!(recall(&created.properties).unwrap(), props(inputs.clone()));

    let sent = server.last_request().unwrap();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.url, "/v1/things");
    assert_eq!(sent.header("Authorization"), Some("Bearer t0ken"));
    assert_eq!(sent.header("Content-Type"), Some("application/json"));
    assert_eq!(
        sent.json().unwrap(),
        json!({"name": "alpha", "display_name": "Alpha", "region": "eu", "tags": ["a"]})
    );

    let read = provider
        .read(
            &ReadRequest {
                urn: urn(THING, "res"),
                id: created.id.clone(),
                properties: created.properties.clone(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap().url, "/v1/things/res-1");
    assert_eq!(read.id, "res-1");
    assert_eq!(read.inputs["region"], PropertyValue::from("eu"));
    assert!(!read.inputs.contains_key("createdAt"));
    assert!(!read.inputs.contains_key("id"));
    // A refresh leaves the recorded inputs as they were.
    assert_eq!(recall(&read.properties).unwrap(), props(inputs.clone()));

    let rename = provider
        .diff(&DiffRequest {
            urn: urn(THING, "res"),
            id: created.id.clone(),
            olds: created.properties.clone(),
            news: props(json!({"name": "alpha", "displayName": "Beta", "tags": ["a"]})),
        })
        .unwrap();
    assert_eq!(rename.changes, DiffChanges::Some);
    assert_eq!(rename.diffs, vec!["displayName"]);
    assert!(rename.replaces.is_empty());

    let move_region = provider
        .diff(&DiffRequest {
            urn: urn(THING, "res"),
            id: created.id.clone(),
            olds: created.properties.clone(),
            news: props(json!({
                "name": "alpha",
                "displayName": "Alpha",
                "tags": ["a"],
                "region": "us"
            })),
        })
        .unwrap();
    assert_eq!(move_region.replaces, vec!["region"]);
    assert!(move_region.requires_replacement());

    let news = props(json!({"name": "alpha", "displayName": "Beta", "tags": ["a", "b"]}));
    let updated = provider
        .update(
            &UpdateRequest {
                urn: urn(THING, "res"),
                id: created.id.clone(),
                olds: created.properties.clone(),
                news: news.clone(),
            },
            &call(),
        )
        .unwrap();
    let sent = server.last_request().unwrap();
    assert_eq!(sent.method, "PATCH");
    assert_eq!(sent.url, "/v1/things/res-1");
    assert_eq!(updated.properties["displayName"], PropertyValue::from("Beta"));
    assert_eq!(updated.properties["createdAt"], created.properties["createdAt"]);
    assert_eq!(recall(&updated.properties).unwrap(), news);

    provider
        .delete(
            &DeleteRequest {
                urn: urn(THING, "res"),
                id: created.id.clone(),
                properties: updated.properties,
            },
            &call(),
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap().method, "DELETE");
    assert!(server.store().get("/v1/things/res-1").is_none());
}

#[test]
fn check_fills_generated_name_and_reports_missing_required() {
    let server = TestServer::start();
    let provider = provider(&server);

    let thing = CheckRequest {
        urn: urn(THING, "web"),
        olds: PropertyMap::new(),
        news: PropertyMap::new(),
        random_seed: b"seed".to_vec(),
    };
    let first = provider.check(&thing).unwrap();
    let name = first.inputs["name"].as_str().unwrap().to_owned();
    assert!(name.starts_with("web-"));
    assert_eq!(name.len(), "web-".len() + 7);
    assert!(first.failures.is_empty());
    assert_eq!(provider.check(&thing).unwrap().inputs["name"], first.inputs["name"]);

    let named = provider
        .check(&CheckRequest {
            news: props(json!({"name": "mine"})),
            ..thing
        })
        .unwrap();
    assert_eq!(named.inputs["name"], PropertyValue::from("mine"));

    let key = provider
        .check(&CheckRequest {
            urn: urn(KEY, "k"),
            olds: PropertyMap::new(),
            news: props(json!({"tailnet": "t1"})),
            random_seed: Vec::new(),
        })
        .unwrap();
    assert_eq!(key.failures.len(), 1);
    assert_eq!(key.failures[0].property, "description");
    assert!(server.requests().is_empty());
}

#[test]
fn create_only_type_replaces_on_any_change() {
    let server = TestServer::start();
    let provider = provider(&server);

    let created = create(&provider, KEY, json!({"tailnet": "t1", "description": "d"}));
    let sent = server.last_request().unwrap();
    assert_eq!(sent.url, "/v1/tailnet/t1/keys");
    assert_eq!(sent.json().unwrap(), json!({"description": "d"}));

    let result = provider
        .diff(&DiffRequest {
            urn: urn(KEY, "res"),
            id: created.id.clone(),
            olds: created.properties.clone(),
            news: props(json!({"tailnet": "t1", "description": "e"})),
        })
        .unwrap();
    assert_eq!(result.changes, DiffChanges::Some);
    assert_eq!(result.diffs, vec!["description"]);
    assert_eq!(result.replaces, vec!["description"]);

    provider
        .read(
            &ReadRequest {
                urn: urn(KEY, "res"),
                id: created.id.clone(),
                properties: created.properties.clone(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(
        server.last_request().unwrap().url,
        format!("/v1/tailnet/t1/keys/{}", created.id)
    );

    provider
        .delete(
            &DeleteRequest {
                urn: urn(KEY, "res"),
                id: created.id.clone(),
                properties: created.properties,
            },
            &call(),
        )
        .unwrap();
    let sent = server.last_request().unwrap();
    assert_eq!(sent.method, "DELETE");
    assert_eq!(sent.url, format!("/v1/tailnet/t1/keys/{}", created.id));
}

#[test]
fn refresh_keeps_outputs_the_api_stops_returning() {
    let server = TestServer::start();
    let provider = provider(&server);

    let created = create(&provider, KEY, json!({"tailnet": "t1", "description": "d"}));
    let created_at = created.properties["createdAt"].clone();
    assert!(created_at.has_value());
    server.store().insert(
        "/v1/tailnet/t1/keys",
        &created.id,
        json!({"id": created.id, "description": "d2"}),
    );

    let read = provider
        .read(
            &ReadRequest {
                urn: urn(KEY, "res"),
                id: created.id.clone(),
                properties: created.properties.clone(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(read.properties["createdAt"], created_at);
    assert_eq!(read.properties["description"], PropertyValue::from("d2"));
    assert_eq!(
        recall(&read.properties).unwrap(),
        recall(&created.properties).unwrap()
    );
}

#[test]
fn path_values_are_encoded_as_single_segments() {
    let server = TestServer::start();
    let provider = provider(&server);

    let created = create(
        &provider,
        KEY,
        json!({"tailnet": "a?b=c#{keyId}", "description": "d"}),
    );
    let sent = server.last_request().unwrap();
    assert_eq!(sent.url, "/v1/tailnet/a%3Fb%3Dc%23%7BkeyId%7D/keys");

    provider
        .read(
            &ReadRequest {
                urn: urn(KEY, "res"),
                id: created.id.clone(),
                properties: created.properties,
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(
        server.last_request().unwrap().url,
        format!("/v1/tailnet/a%3Fb%3Dc%23%7BkeyId%7D/keys/{}", created.id)
    );
}

#[test]
fn update_and_delete_require_persisted_state() {
    let server = TestServer::start();
    let provider = provider(&server);

    let err = provider
        .update(
            &UpdateRequest {
                urn: urn(THING, "res"),
                id: "x".to_owned(),
                olds: PropertyMap::new(),
                news: props(json!({"name": "n"})),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }), "{err}");

    let err = provider
        .delete(
            &DeleteRequest {
                urn: urn(THING, "res"),
                id: "x".to_owned(),
                properties: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }), "{err}");
    assert!(server.requests().is_empty());
}

#[test]
fn import_spreads_id_and_path_parameter_addition_is_no_change() {
    let server = TestServer::start();
    server.store().insert(
        "/v1/tailnet/t1/keys",
        "k9",
        json!({"id": "k9", "description": "d", "createdAt": 1}),
    );
    let provider = provider(&server);

    let read = provider
        .read(
            &ReadRequest {
                urn: urn(KEY, "imported"),
                id: "t1/k9".to_owned(),
                properties: PropertyMap::new(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap().url, "/v1/tailnet/t1/keys/k9");
    assert_eq!(read.id, "k9");
    assert_eq!(read.inputs, props(json!({"description": "d"})));
    assert_eq!(recall(&read.properties).unwrap(), read.inputs);

    let result = provider
        .diff(&DiffRequest {
            urn: urn(KEY, "imported"),
            id: read.id,
            olds: read.properties,
            news: props(json!({"description": "d", "tailnet": "t1"})),
        })
        .unwrap();
    assert_eq!(result.changes, DiffChanges::None);
}

#[test]
fn read_only_properties_are_not_recorded_as_inputs() {
    let server = TestServer::start();
    server.store().insert(
        "/v1/things",
        "x",
        json!({"id": "x", "createdAt": "2020-01-01", "name": "n"}),
    );
    let provider = provider(&server);

    let read = provider
        .read(
            &ReadRequest {
                urn: urn(THING, "x"),
                id: "x".to_owned(),
                properties: PropertyMap::new(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(read.inputs, props(json!({"name": "n"})));
    assert_eq!(read.properties["createdAt"], PropertyValue::from("2020-01-01"));
}

#[test]
fn stateless_refresh_resolves_from_declared_inputs() {
    let server = TestServer::start();
    server
        .store()
        .insert("/v1/tailnet/t2/keys", "k1", json!({"id": "k1", "description": "d"}));
    let provider = provider(&server);

    let read = provider
        .read(
            &ReadRequest {
                urn: urn(KEY, "k"),
                id: "k1".to_owned(),
                properties: PropertyMap::new(),
                inputs: props(json!({"tailnet": "t2", "description": "d"})),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap().url, "/v1/tailnet/t2/keys/k1");
    assert_eq!(read.id, "k1");
}

#[test]
fn put_creates_and_updates_token_and_echoed_secret_is_plain() {
    let server = TestServer::start();
    let provider = provider(&server);

    let mut inputs = props(json!({"userId": "u1", "tokenName": "ci", "scope": "read"}));
    inputs.insert(
        "secretValue".to_owned(),
        PropertyValue::secret(PropertyValue::from("s3cr3t")),
    );
    let created = provider
        .create(
            &CreateRequest {
                urn: urn(TOKEN, "ci"),
                properties: inputs.clone(),
            },
            &call(),
        )
        .unwrap();
    let sent = server.last_request().unwrap();
    assert_eq!(sent.method, "PUT");
    assert_eq!(sent.url, "/v1/users/u1/tokens/ci");
    assert_eq!(
        sent.json().unwrap(),
        json!({"scope": "read", "secretValue": "s3cr3t"})
    );
    assert_eq!(created.id, "ci");

    let scope_change = provider
        .diff(&DiffRequest {
            urn: urn(TOKEN, "ci"),
            id: created.id.clone(),
            olds: created.properties.clone(),
            news: props(json!({"userId": "u1", "tokenName": "deploy", "scope": "write"})),
        })
        .unwrap();
    assert_eq!(scope_change.diffs, vec!["scope", "secretValue"]);
    assert_eq!(scope_change.replaces, vec!["tokenName"]);

    let mut news = props(json!({"userId": "u1", "tokenName": "ci", "scope": "write"}));
    news.insert(
        "secretValue".to_owned(),
        PropertyValue::secret(PropertyValue::from("n3w")),
    );
    let updated = provider
        .update(
            &UpdateRequest {
                urn: urn(TOKEN, "ci"),
                id: created.id.clone(),
                olds: created.properties,
                news: news.clone(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(server.last_request().unwrap().method, "PUT");
    assert_eq!(updated.properties["secretValue"], PropertyValue::from("n3w"));
    assert!(!updated.properties["secretValue"].is_secret());
    assert_eq!(recall(&updated.properties).unwrap(), news);
}

#[test]
fn update_without_content_keeps_prior_outputs() {
    let server = TestServer::start();
    let provider = provider(&server);
    let created = create(&provider, THING, json!({"name": "alpha", "displayName": "Alpha"}));
    server.script(ScriptedResponse::new("PATCH", "/v1/things/res-1", 204));

    let news = props(json!({"name": "alpha", "displayName": "Beta"}));
    let updated = provider
        .update(
            &UpdateRequest {
                urn: urn(THING, "res"),
                id: created.id,
                olds: created.properties,
                news: news.clone(),
            },
            &call(),
        )
        .unwrap();
    assert_eq!(updated.properties["displayName"], PropertyValue::from("Alpha"));
    assert_eq!(recall(&updated.properties).unwrap(), news);
}

#[test]
fn upstream_failure_carries_status_and_body() {
    let server = TestServer::start();
    server.script(ScriptedResponse::new("POST", "/v1/things", 500).with_body("boom"));
    let provider = provider(&server);

    let err = provider
        .create(
            &CreateRequest {
                urn: urn(THING, "res"),
                properties: props(json!({"name": "alpha"})),
            },
            &call(),
        )
        .unwrap_err();
    match err {
        CoreError::UpstreamHttp {
            type_token,
            method,
            status,
            body,
            ..
        } => {
            assert_eq!(type_token, THING);
            assert_eq!(method, "POST");
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected UpstreamHttp, got {other:?}"),
    }
}

#[test]
fn redirect_is_not_followed() {
    let server = TestServer::start();
    server.store().insert("/v1/things", "a", json!({"id": "a", "name": "n"}));
    server.script(
        ScriptedResponse::new("GET", "/v1/things/a", 302).with_header("Location", "/v1/things/b"),
    );
    let provider = provider(&server);

    let err = provider
        .read(
            &ReadRequest {
                urn: urn(THING, "a"),
                id: "a".to_owned(),
                properties: PropertyMap::new(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::UpstreamHttp { status: 302, .. }));
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn non_object_response_is_a_decode_error() {
    let server = TestServer::start();
    server.script(ScriptedResponse::new("GET", "/v1/things/a", 200).with_body("42"));
    let provider = provider(&server);

    let err = provider
        .read(
            &ReadRequest {
                urn: urn(THING, "a"),
                id: "a".to_owned(),
                properties: PropertyMap::new(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::ResponseDecode { .. }));
}

#[test]
fn accepted_create_without_body_has_no_identifier() {
    let server = TestServer::start();
    server.script(ScriptedResponse::new("POST", "/v1/things", 202));
    let provider = provider(&server);

    let err = provider
        .create(
            &CreateRequest {
                urn: urn(THING, "res"),
                properties: props(json!({"name": "alpha"})),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingIdentifier { .. }));
}

#[test]
fn delete_without_endpoint_only_drops_state() {
    let server = TestServer::start();
    let provider = provider(&server);

    provider
        .delete(
            &DeleteRequest {
                urn: urn(NOTE, "n"),
                id: "n1".to_owned(),
                properties: props(json!({"id": "n1", "text": "hi"})),
            },
            &call(),
        )
        .unwrap();
    assert!(server.requests().is_empty());
}

#[test]
fn invoke_envelopes_list_responses() {
    let server = TestServer::start();
    server.store().insert("/v1/zones", "z1", json!({"id": "z1", "label": "one"}));
    server.store().insert("/v1/zones", "z2", json!({"id": "z2", "label": "two"}));
    let provider = provider(&server);

    let response = provider
        .invoke(
            &InvokeRequest {
                token: TypeToken::new("demo:zones:listZones"),
                args: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap();
    let items = response.outputs["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].as_object().unwrap()["label"],
        PropertyValue::from("one")
    );
}

#[test]
fn missing_credential_fails_before_sending() {
    let server = TestServer::start();
    let mut provider = Provider::new("nocred", catalog());
    let mut variables = BTreeMap::new();
    variables.insert("nocred:config:apiHost".to_owned(), server.url.clone());
    provider
        .configure(&ConfigureRequest {
            variables,
            ..ConfigureRequest::default()
        })
        .unwrap();

    let err = provider
        .create(
            &CreateRequest {
                urn: urn(THING, "res"),
                properties: props(json!({"name": "alpha"})),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::RequestValidation { .. }));
    assert!(server.requests().is_empty());
}

#[test]
fn cancelled_call_never_reaches_the_api() {
    let server = TestServer::start();
    let provider = provider(&server);
    let ctx = CallContext::new();
    ctx.cancel();

    let err = provider
        .create(
            &CreateRequest {
                urn: urn(THING, "res"),
                properties: props(json!({"name": "alpha"})),
            },
            &ctx,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Remote(RemoteError::Cancelled)));
    assert!(server.requests().is_empty());
}

#[test]
fn diff_without_recorded_inputs_is_an_error() {
    let server = TestServer::start();
    let provider = provider(&server);
    let err = provider
        .diff(&DiffRequest {
            urn: urn(THING, "res"),
            id: "res-1".to_owned(),
            olds: props(json!({"id": "res-1", "name": "a"})),
            news: props(json!({"name": "b"})),
        })
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingRecordedInputs { .. }));
}

#[test]
fn configure_reads_environment_and_adds_scheme() {
    let server = TestServer::start();
    std::env::set_var("ENVDEMO_API_HOST", format!("127.0.0.1:{}", server.port));
    std::env::set_var("ENVDEMO_API_KEY", "from-env");

    let mut provider = Provider::new("envdemo", catalog());
    assert_eq!(provider.base_url(), "https://api.demo.example/v1");
    let response = provider.configure(&ConfigureRequest::default()).unwrap();
    assert!(response.accept_secrets);
    assert_eq!(
        provider.base_url(),
        format!("http://127.0.0.1:{}/v1", server.port)
    );

    create(&provider, NOTE, json!({"text": "hi"}));
    let sent = server.last_request().unwrap();
    assert_eq!(sent.url, "/v1/notes");
    assert_eq!(sent.header("Authorization"), Some("Bearer from-env"));
}

#[derive(Default)]
struct RecordingHooks {
    deletes_answered: Arc<AtomicUsize>,
}

impl ProviderHooks for RecordingHooks {
    fn global_path_params(&self, _req: &ConfigureRequest) -> Result<PathDefaults, HookError> {
        let mut defaults = PathDefaults::new();
        defaults.insert("tailnet", "-");
        Ok(defaults)
    }

    fn on_pre_create(
        &self,
        ctx: &HookContext<'_>,
        _inputs: &PropertyMap,
        request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        request.set_header("X-Resource-Type", ctx.type_token);
        Ok(HookFlow::Continue)
    }

    fn on_pre_delete(
        &self,
        _ctx: &HookContext<'_>,
        _request: &mut PreparedRequest,
    ) -> Result<HookFlow, HookError> {
        self.deletes_answered.fetch_add(1, Ordering::SeqCst);
        Ok(HookFlow::Respond(HttpResponse::new(204, Vec::new())))
    }
}

#[test]
fn hooks_supply_defaults_modify_requests_and_short_circuit() {
    let server = TestServer::start();
    let hooks = RecordingHooks::default();
    let answered = Arc::clone(&hooks.deletes_answered);
    let provider = configured(
        Provider::new("demo", catalog()).with_hooks(hooks),
        &server,
    );
    assert_eq!(provider.global_path_params().get("tailnet"), Some("-"));

    let created = create(&provider, KEY, json!({"description": "d"}));
    let sent = server.last_request().unwrap();
    assert_eq!(sent.url, "/v1/tailnet/-/keys");
    assert_eq!(sent.header("X-Resource-Type"), Some(KEY));

    provider
        .delete(
            &DeleteRequest {
                urn: urn(KEY, "res"),
                id: created.id,
                properties: created.properties,
            },
            &call(),
        )
        .unwrap();
    assert_eq!(answered.load(Ordering::SeqCst), 1);
    assert_eq!(server.requests().len(), 1);
}

struct FixedConfigure;

impl ProviderHooks for FixedConfigure {
    fn on_configure(
        &self,
        _req: &ConfigureRequest,
    ) -> Result<Option<ConfigureResponse>, HookError> {
        Ok(Some(ConfigureResponse {
            accept_secrets: false,
            supports_preview: true,
        }))
    }
}

#[test]
fn configure_hook_overrides_defaults() {
    let server = TestServer::start();
    let mut provider = Provider::new("demo", catalog()).with_hooks(FixedConfigure);
    let response = provider
        .configure(&ConfigureRequest {
            variables: variables(&server),
            ..ConfigureRequest::default()
        })
        .unwrap();
    assert!(!response.accept_secrets);
    assert!(response.supports_preview);
    assert_eq!(provider.base_url(), "https://api.demo.example/v1");
}

#[test]
fn unknown_type_is_rejected() {
    let server = TestServer::start();
    let provider = provider(&server);
    let err = provider
        .read(
            &ReadRequest {
                urn: urn("demo:nope:Nope", "x"),
                id: "x".to_owned(),
                properties: PropertyMap::new(),
                inputs: PropertyMap::new(),
            },
            &call(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownResourceType(_)));
}
