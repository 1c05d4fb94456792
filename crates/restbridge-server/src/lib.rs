//! Reference REST API used to exercise restbridge providers end to end.
//!
//! Any path is a resource: `POST /things` creates an object in the `/things`
//! collection, `GET /things/{id}` reads it back, `GET /things` lists the
//! collection, `PUT` upserts, `PATCH` merges top-level fields and `DELETE`
//! removes. Created objects gain a server-assigned `id` and `createdAt`.
//!
//! Every request is recorded, and scripted responses can be queued for a
//! method and path to simulate upstream failures, redirects and empty bodies.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

/// A request as the server received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// A canned response served instead of the store for one method and path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedResponse {
    pub method: String,
    pub path: String,
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// How many requests this answers; `None` answers every match.
    #[serde(default)]
    pub times: Option<usize>,
}

impl ScriptedResponse {
    pub fn new(method: &str, path: &str, status: u16) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_owned(),
            status,
            body: String::new(),
            headers: Vec::new(),
            times: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn once(mut self) -> Self {
        self.times = Some(1);
        self
    }
}

/// Seed data: collection path to the objects it holds, keyed by `id`.
pub type Seed = BTreeMap<String, Vec<Value>>;

/// In-memory collections of JSON objects.
#[derive(Default)]
pub struct Store {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    next_id: AtomicU64,
    requests: Mutex<Vec<RecordedRequest>>,
    scripts: Mutex<Vec<ScriptedResponse>>,
}

/// Outcome of a store operation, before it is written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
}

impl Reply {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }
}

fn split_item(path: &str) -> Option<(&str, &str)> {
    let (collection, id) = path.rsplit_once('/')?;
    if collection.is_empty() || id.is_empty() {
        None
    } else {
        Some((collection, id))
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `seed`. Objects without an `id` are skipped.
    pub fn with_seed(seed: Seed) -> Self {
        let store = Self::new();
        {
            let mut collections = store.write();
            for (collection, objects) in seed {
                let entries = collections.entry(collection.clone()).or_default();
                for object in objects {
                    let Some(id) = object.get("id").and_then(id_string) else {
                        warn!("seed object in {collection} has no id, skipping");
                        continue;
                    };
                    entries.insert(id, object);
                }
            }
        }
        store
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, BTreeMap<String, Value>>> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, BTreeMap<String, Value>>> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a scripted response. Earlier scripts for the same route win.
    pub fn script(&self, response: ScriptedResponse) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(response);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn record(&self, request: RecordedRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    /// The stored object at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Value> {
        let (collection, id) = split_item(path)?;
        self.read().get(collection)?.get(id).cloned()
    }

    /// Put an object directly into a collection, bypassing HTTP.
    pub fn insert(&self, collection: &str, id: &str, object: Value) {
        self.write()
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), object);
    }

    fn take_script(&self, method: &str, path: &str) -> Option<ScriptedResponse> {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let index = scripts
            .iter()
            .position(|s| s.method.eq_ignore_ascii_case(method) && s.path == path)?;
        let script = match scripts[index].times {
            Some(remaining) if remaining <= 1 => scripts.remove(index),
            Some(remaining) => {
                scripts[index].times = Some(remaining - 1);
                scripts[index].clone()
            }
            None => scripts[index].clone(),
        };
        Some(script)
    }

    fn create(&self, collection: &str, body: Value) -> Reply {
        let Value::Object(mut object) = body else {
            return Reply::error(400, "expected a JSON object");
        };
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = object
            .get("id")
            .and_then(id_string)
            .unwrap_or_else(|| format!("res-{n}"));
        object.insert("id".to_owned(), Value::String(id.clone()));
        object.insert("createdAt".to_owned(), Value::from(timestamp()));
        let object = Value::Object(object);
        self.insert(collection, &id, object.clone());
        info!("created {collection}/{id}");
        Reply::json(201, object)
    }

    fn upsert(&self, path: &str, body: Value) -> Reply {
        let Some((collection, id)) = split_item(path) else {
            return Reply::error(400, "PUT needs an item path");
        };
        let Value::Object(mut object) = body else {
            return Reply::error(400, "expected a JSON object");
        };
        let existing = self.get(path);
        object
            .entry("id".to_owned())
            .or_insert_with(|| Value::String(id.to_owned()));
        let created_at = existing
            .as_ref()
            .and_then(|e| e.get("createdAt").cloned())
            .unwrap_or_else(|| Value::from(timestamp()));
        object.insert("createdAt".to_owned(), created_at);
        let object = Value::Object(object);
        self.insert(collection, id, object.clone());
        debug!("upserted {path}");
        Reply::json(if existing.is_some() { 200 } else { 201 }, object)
    }

    fn merge(&self, path: &str, body: Value) -> Reply {
        let Some((collection, id)) = split_item(path) else {
            return Reply::error(400, "PATCH needs an item path");
        };
        let Value::Object(patch) = body else {
            return Reply::error(400, "expected a JSON object");
        };
        let mut collections = self.write();
        let Some(Value::Object(object)) = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
        else {
            return Reply::error(404, "not found");
        };
        for (key, value) in patch {
            if key != "id" {
                object.insert(key, value);
            }
        }
        debug!("patched {path}");
        Reply::json(200, Value::Object(object.clone()))
    }

    fn fetch(&self, path: &str) -> Reply {
        if let Some(object) = self.get(path) {
            return Reply::json(200, object);
        }
        match self.read().get(path) {
            Some(items) => Reply::json(200, Value::Array(items.values().cloned().collect())),
            None => Reply::error(404, "not found"),
        }
    }

    fn remove(&self, path: &str) -> Reply {
        let Some((collection, id)) = split_item(path) else {
            return Reply::error(400, "DELETE needs an item path");
        };
        let removed = self
            .write()
            .get_mut(collection)
            .and_then(|c| c.remove(id));
        if removed.is_some() {
            info!("deleted {path}");
            Reply::empty(204)
        } else {
            Reply::error(404, "not found")
        }
    }

    /// Apply one request to the store.
    pub fn dispatch(&self, method: &Method, path: &str, body: &[u8]) -> Reply {
        let parsed = if body.iter().all(u8::is_ascii_whitespace) {
            Ok(Value::Object(Map::new()))
        } else {
            serde_json::from_slice(body)
        };
        let Ok(json) = parsed else {
            return Reply::error(400, "malformed JSON body");
        };
        match *method {
            Method::Get => self.fetch(path),
            Method::Post => self.create(path, json),
            Method::Put => self.upsert(path, json),
            Method::Patch => self.merge(path, json),
            Method::Delete => self.remove(path),
            _ => Reply::error(405, "method not allowed"),
        }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(req: tiny_http::Request, status: u16, body: Vec<u8>, headers: &[(String, String)]) {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for (name, value) in headers {
        if let Some(h) = header(name, value) {
            response.add_header(h);
        }
    }
    let _ = req.respond(response);
}

/// Handle a single HTTP request: record it, then answer from a script or the store.
pub fn handle_request(store: &Store, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    let path = url.split('?').next().unwrap_or_default().to_owned();
    debug!("{method} {url}");

    let mut body = Vec::new();
    if let Err(e) = req.as_reader().read_to_end(&mut body) {
        warn!("{method} {url}: failed to read body: {e}");
        respond(req, 500, b"read error".to_vec(), &[]);
        return;
    }
    store.record(RecordedRequest {
        method: method.to_string(),
        url: url.clone(),
        headers: req
            .headers()
            .iter()
            .map(|h| (h.field.to_string(), h.value.to_string()))
            .collect(),
        body: body.clone(),
    });

    if path == "/health" && method == Method::Get {
        respond(req, 200, br#"{"status":"ok"}"#.to_vec(), &[]);
        return;
    }

    if let Some(script) = store.take_script(method.as_str(), &path) {
        debug!("{method} {path}: scripted {}", script.status);
        respond(req, script.status, script.body.into_bytes(), &script.headers);
        return;
    }

    let reply = store.dispatch(&method, &path, &body);
    let json = [("Content-Type".to_owned(), "application/json".to_owned())];
    match reply.body {
        Some(value) => {
            let bytes = serde_json::to_vec(&value).unwrap_or_default();
            respond(req, reply.status, bytes, &json);
        }
        None => respond(req, reply.status, Vec::new(), &[]),
    }
}

/// Serve requests on `server` until it is unblocked.
pub fn serve(server: &Server, store: &Store) {
    for request in server.incoming_requests() {
        handle_request(store, request);
    }
}

/// Bind `addr` and serve, blocking the current thread.
pub fn run_server(
    store: &Store,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    info!("listening on {addr}");
    serve(&server, store);
    Ok(())
}

/// A test helper that starts a server on a random port in a background thread.
///
/// Drop the `TestServer` to stop it.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    store: Arc<Store>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Start a test server with an empty store.
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start() -> Self {
        Self::with_store(Store::new())
    }

    pub fn with_store(store: Store) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let store = Arc::new(store);
        let srv = Arc::clone(&server);
        let st = Arc::clone(&store);
        let handle = std::thread::spawn(move || serve(&srv, &st));

        Self {
            url,
            port,
            store,
            server,
            handle: Some(handle),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn script(&self, response: ScriptedResponse) {
        self.store.script(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.store.requests()
    }

    /// The most recent request, if any arrived.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.store.requests().pop()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
