#![allow(dead_code)]

#[path = "../../src/crl/fixtures.rs"]
pub mod fixtures;

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
};
use crl_sync::{
    device::{AuthMethod, BigIpConfig},
    logger::Logger,
    telemetry,
};
use serde_json::{Value, json};

pub const TRANS_ID: i64 = 123456789;
pub const TOKEN: &str = "mock-token";
pub const INITIAL_CRL_FILE: &str = "/Common/previous.crl";

/// A request as seen by the mock device.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub coordination_id: Option<String>,
    pub authorization: Option<String>,
    pub auth_token: Option<String>,
    pub content_range: Option<String>,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Name of the endpoint answering 404, if any.
    pub disable: Option<&'static str>,
    pub crl_file: String,
    pub staged_crl_file: Option<String>,
    pub requests: Vec<Recorded>,
    pub commits: usize,
    /// Token handed out by the next login; older tokens are refused.
    pub token: String,
}

type Shared = Arc<Mutex<MockState>>;

/// A BIG-IP answering the handful of iControl REST calls a push needs.
pub struct MockBigIp {
    pub url: String,
    pub state: Shared,
}

impl MockBigIp {
    pub fn disable(&self, endpoint: &'static str) {
        self.state.lock().unwrap().disable = Some(endpoint);
    }

    /// Expire every token issued so far.
    pub fn rotate_token(&self, token: &str) {
        self.state.lock().unwrap().token = token.to_string();
    }

    pub fn crl_file(&self) -> String {
        self.state.lock().unwrap().crl_file.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path_prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .collect()
    }

    pub fn config(&self, auth_method: AuthMethod) -> BigIpConfig {
        BigIpConfig {
            name: Some("mock-bigip".to_string()),
            url: self.url.clone(),
            auth_method,
            user: "admin".to_string(),
            password: "admin".to_string(),
            ssl_check: true,
            login_provider_name: None,
        }
    }
}

type Rejection = (StatusCode, &'static str);
type Reply = Result<Json<Value>, Rejection>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Record the request, then refuse it when its token is stale or `endpoint`
/// is disabled.
fn accept(
    state: &Shared,
    endpoint: &str,
    method: &'static str,
    path: String,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<(), Rejection> {
    let recorded = Recorded {
        method,
        path,
        coordination_id: header(headers, "x-f5-rest-coordination-id"),
        authorization: header(headers, "authorization"),
        auth_token: header(headers, "x-f5-auth-token"),
        content_range: header(headers, "content-range"),
        body,
    };

    let mut state = state.lock().unwrap();
    let stale_token = recorded
        .auth_token
        .as_deref()
        .is_some_and(|token| token != state.token);
    state.requests.push(recorded);

    if stale_token {
        return Err((StatusCode::UNAUTHORIZED, "token expired"));
    }
    if state.disable == Some(endpoint) {
        return Err((StatusCode::NOT_FOUND, "disabled"));
    }
    Ok(())
}

fn parse_json(body: &[u8]) -> Result<Value, Rejection> {
    serde_json::from_slice(body).map_err(|_| (StatusCode::BAD_REQUEST, "bad json"))
}

async fn login(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Reply {
    let path = "/mgmt/shared/authn/login".to_string();
    accept(&state, "login", "POST", path, &headers, body.clone())?;
    let credentials = parse_json(&body)?;
    if credentials["username"] != "admin" || credentials["password"] != "admin" {
        return Err((StatusCode::UNAUTHORIZED, "bad credentials"));
    }
    let token = state.lock().unwrap().token.clone();
    Ok(Json(json!({ "token": { "token": token } })))
}

async fn begin_transaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let path = "/mgmt/tm/transaction".to_string();
    accept(&state, "begin_transaction", "POST", path, &headers, body)?;
    Ok(Json(json!({ "transId": TRANS_ID, "state": "STARTED" })))
}

async fn commit_transaction(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let path = format!("/mgmt/tm/transaction/{id}");
    accept(&state, "commit_transaction", "PATCH", path, &headers, body)?;
    if id != TRANS_ID {
        return Err((StatusCode::NOT_FOUND, "unknown transaction"));
    }
    let mut state = state.lock().unwrap();
    state.commits += 1;
    if let Some(crl_file) = state.staged_crl_file.take() {
        state.crl_file = crl_file;
    }
    Ok(Json(json!({ "transId": TRANS_ID, "state": "COMPLETED" })))
}

async fn upload(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let len = body.len();
    let path = format!("/mgmt/shared/file-transfer/uploads/{name}");
    accept(&state, "upload", "POST", path, &headers, body)?;
    Ok(Json(json!({ "remainingByteCount": 0, "totalByteCount": len })))
}

async fn import_crl(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Reply {
    let path = "/mgmt/tm/sys/file/ssl-crl".to_string();
    accept(&state, "ssl-crl", "POST", path, &headers, body.clone())?;
    let import = parse_json(&body)?;
    Ok(Json(json!({
        "kind": "tm:sys:file:ssl-crl:ssl-crlstate",
        "name": format!("{}.crl", import["name"].as_str().unwrap_or_default()),
        "sourcePath": import["sourcePath"],
    })))
}

fn profile(crl_file: &str) -> Value {
    json!({
        "kind": "tm:ltm:profile:client-ssl:client-sslstate",
        "name": "clientssl",
        "ciphers": "DEFAULT",
        "cert": "/Common/default.crt",
        "crlFile": crl_file,
    })
}

async fn get_profile(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Reply {
    let path = format!("/mgmt/tm/ltm/profile/client-ssl/{name}");
    accept(&state, "client-ssl_get", "GET", path, &headers, Bytes::new())?;
    let state = state.lock().unwrap();
    if state.disable == Some("client-ssl_get_updated_crl") {
        return Ok(Json(profile("")));
    }
    Ok(Json(profile(&state.crl_file)))
}

async fn put_profile(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let path = format!("/mgmt/tm/ltm/profile/client-ssl/{name}");
    accept(&state, "client-ssl_put", "PUT", path, &headers, body.clone())?;
    let update = parse_json(&body)?;
    let crl_file = update["crlFile"].as_str().unwrap_or_default().to_string();
    // The device reports the file with its partition.
    state.lock().unwrap().staged_crl_file = Some(format!("/Common/{crl_file}"));
    Ok(Json(update))
}

/// Spawn a mock BIG-IP on a random local port.
pub async fn spawn_bigip() -> MockBigIp {
    telemetry::init_tracing(false);

    let state: Shared = Arc::new(Mutex::new(MockState {
        crl_file: INITIAL_CRL_FILE.to_string(),
        token: TOKEN.to_string(),
        ..Default::default()
    }));

    let app = Router::new()
        .route("/mgmt/shared/authn/login", post(login))
        .route("/mgmt/tm/transaction", post(begin_transaction))
        .route("/mgmt/tm/transaction/{id}", patch(commit_transaction))
        .route("/mgmt/shared/file-transfer/uploads/{name}", post(upload))
        .route("/mgmt/tm/sys/file/ssl-crl", post(import_crl))
        .route(
            "/mgmt/tm/ltm/profile/client-ssl/{name}",
            get(get_profile).put(put_profile),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("failed to run mock BIG-IP");
    });

    MockBigIp {
        url: format!("http://{addr}"),
        state,
    }
}

#[derive(Debug, Default)]
pub struct RecordingLogger {
    errors: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
