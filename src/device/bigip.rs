use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, Url,
    header::{CONTENT_RANGE, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::errors::{DeviceError, DeviceResult};
use super::{DeviceTarget, ProfileConfig, Transaction};

const TRANSACTION_PATH: &str = "/mgmt/tm/transaction";
const UPLOAD_PATH: &str = "/mgmt/shared/file-transfer/uploads";
const SSL_CRL_PATH: &str = "/mgmt/tm/sys/file/ssl-crl";
const CLIENT_SSL_PATH: &str = "/mgmt/tm/ltm/profile/client-ssl";
const LOGIN_PATH: &str = "/mgmt/shared/authn/login";
/// Directory the file-transfer endpoint writes uploads to.
const UPLOAD_DIR: &str = "/var/config/rest/downloads";

const COORDINATION_HEADER: &str = "X-F5-REST-Coordination-Id";
const AUTH_TOKEN_HEADER: &str = "X-F5-Auth-Token";

/// The file-transfer endpoint refuses chunks above 1 MiB.
const UPLOAD_CHUNK_SIZE: usize = 512 * 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LOGIN_PROVIDER: &str = "tmos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Basic,
    Token,
}

/// Connection settings for one BIG-IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigIpConfig {
    /// Name used in logs, defaults to the URL.
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    pub auth_method: AuthMethod,
    pub user: String,
    pub password: String,
    #[serde(default = "default_ssl_check")]
    pub ssl_check: bool,
    #[serde(default)]
    pub login_provider_name: Option<String>,
}

fn default_ssl_check() -> bool {
    true
}

#[derive(Clone)]
enum Credentials {
    Basic { user: String, password: String },
    Token(Arc<TokenAuth>),
}

/// Login material kept around so an expired token can be replaced.
struct TokenAuth {
    user: String,
    password: String,
    login_provider_name: String,
    token: RwLock<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { user, .. } => write!(f, "Basic({user})"),
            Credentials::Token(auth) => write!(f, "Token({}, ..)", auth.user),
        }
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: LoginToken,
}

#[derive(Deserialize)]
struct LoginToken {
    token: String,
}

#[derive(Deserialize)]
struct TransactionResponse {
    #[serde(rename = "transId")]
    trans_id: i64,
}

/// iControl REST client for a single BIG-IP.
///
/// Cloning is cheap; clones share the underlying connection pool and, with
/// token authentication, the current token.
#[derive(Debug, Clone)]
pub struct BigIpClient {
    name: String,
    base_url: String,
    http_client: Client,
    credentials: Credentials,
}

impl BigIpClient {
    /// Build a client and, for token authentication, log in right away.
    pub async fn connect(config: &BigIpConfig) -> DeviceResult<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| DeviceError::InvalidUrl(format!("{base_url}: {e}")))?;

        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!config.ssl_check)
            .build()?;

        let credentials = match config.auth_method {
            AuthMethod::Basic => Credentials::Basic {
                user: config.user.clone(),
                password: config.password.clone(),
            },
            AuthMethod::Token => {
                let mut auth = TokenAuth {
                    user: config.user.clone(),
                    password: config.password.clone(),
                    login_provider_name: config
                        .login_provider_name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LOGIN_PROVIDER.to_string()),
                    token: RwLock::default(),
                };
                let token = login(&http_client, &base_url, &auth).await?;
                auth.token = RwLock::new(token);
                Credentials::Token(Arc::new(auth))
            }
        };

        let name = config.name.clone().unwrap_or_else(|| base_url.clone());
        info!("Initialized BIG-IP client {} ({:?} auth)", name, config.auth_method);

        Ok(Self {
            name,
            base_url,
            http_client,
            credentials,
        })
    }

    /// Send an authenticated request built by `configure`.
    ///
    /// With token authentication a 401 triggers one new login and one retry.
    async fn execute<F>(&self, method: Method, path: &str, configure: F) -> DeviceResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let request = || configure(self.http_client.request(method.clone(), &url));

        let auth = match &self.credentials {
            Credentials::Basic { user, password } => {
                return send(request().basic_auth(user, Some(password))).await;
            }
            Credentials::Token(auth) => auth,
        };

        let token = auth.token.read().await.clone();
        let result = send(request().header(AUTH_TOKEN_HEADER, &token)).await;
        if let Err(DeviceError::Status { status, .. }) = &result
            && *status == StatusCode::UNAUTHORIZED
        {
            let token = self.refresh_token(auth, &token).await?;
            return send(request().header(AUTH_TOKEN_HEADER, &token)).await;
        }
        result
    }

    /// Replace `rejected` with a fresh token unless a concurrent request
    /// already did.
    async fn refresh_token(&self, auth: &TokenAuth, rejected: &str) -> DeviceResult<String> {
        let mut token = auth.token.write().await;
        if *token == rejected {
            warn!("Auth token rejected by {}, logging in again", self.name);
            *token = login(&self.http_client, &self.base_url, auth).await?;
        }
        Ok(token.clone())
    }

    async fn read_profile(
        &self,
        profile_name: &str,
        trans_id: Option<i64>,
    ) -> DeviceResult<ProfileConfig> {
        let response = self
            .execute(Method::GET, &profile_path(profile_name), |request| match trans_id {
                Some(id) => request.header(COORDINATION_HEADER, id.to_string()),
                None => request,
            })
            .await?;
        response
            .json::<ProfileConfig>()
            .await
            .map_err(|e| DeviceError::InvalidResponse(format!("cannot decode profile: {e}")))
    }
}

async fn login(http_client: &Client, base_url: &str, auth: &TokenAuth) -> DeviceResult<String> {
    debug!("Requesting auth token from {}", base_url);

    let body = json!({
        "username": auth.user,
        "password": auth.password,
        "loginProviderName": auth.login_provider_name,
    });
    let response = http_client
        .post(format!("{base_url}{LOGIN_PATH}"))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DeviceError::Auth(format!("http response error: {status}")));
    }

    let login: LoginResponse = response
        .json()
        .await
        .map_err(|e| DeviceError::Auth(format!("cannot decode login response: {e}")))?;
    Ok(login.token.token)
}

/// Partition separators in object names map to `~` in REST paths.
fn profile_path(profile_name: &str) -> String {
    format!("{CLIENT_SSL_PATH}/{}", profile_name.replace('/', "~"))
}

async fn send(request: RequestBuilder) -> DeviceResult<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(DeviceError::Status { status, body });
    }
    Ok(response)
}

#[async_trait]
impl DeviceTarget for BigIpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin_transaction(&self) -> DeviceResult<Box<dyn Transaction>> {
        let response = self
            .execute(Method::POST, TRANSACTION_PATH, |request| request.json(&json!({})))
            .await?;
        let transaction: TransactionResponse = response.json().await.map_err(|e| {
            DeviceError::InvalidResponse(format!("cannot decode transaction: {e}"))
        })?;

        debug!("Started transaction {} on {}", transaction.trans_id, self.name);
        Ok(Box::new(BigIpTransaction {
            client: self.clone(),
            trans_id: transaction.trans_id,
        }))
    }

    async fn get_profile(&self, profile_name: &str) -> DeviceResult<ProfileConfig> {
        self.read_profile(profile_name, None).await
    }
}

/// An open iControl REST transaction.
#[derive(Debug)]
struct BigIpTransaction {
    client: BigIpClient,
    trans_id: i64,
}

#[async_trait]
impl Transaction for BigIpTransaction {
    async fn upload_file(&mut self, name: &str, contents: &[u8]) -> DeviceResult<()> {
        if contents.is_empty() {
            return Err(DeviceError::Custom("refusing to upload an empty file".to_string()));
        }

        // File transfers are not part of the transaction, only the import is.
        let total = contents.len();
        let path = format!("{UPLOAD_PATH}/{name}");
        for (index, chunk) in contents.chunks(UPLOAD_CHUNK_SIZE).enumerate() {
            let start = index * UPLOAD_CHUNK_SIZE;
            let range = format!("{start}-{}/{total}", start + chunk.len() - 1);
            self.client
                .execute(Method::POST, &path, |request| {
                    request
                        .header(CONTENT_RANGE, &range)
                        .header(CONTENT_TYPE, "application/octet-stream")
                        .body(chunk.to_vec())
                })
                .await?;
        }

        let trans_id = self.trans_id.to_string();
        let import = json!({
            "name": name,
            "sourcePath": format!("file:{UPLOAD_DIR}/{name}"),
        });
        self.client
            .execute(Method::POST, SSL_CRL_PATH, |request| {
                request.header(COORDINATION_HEADER, &trans_id).json(&import)
            })
            .await?;
        Ok(())
    }

    async fn get_profile(&mut self, profile_name: &str) -> DeviceResult<ProfileConfig> {
        self.client
            .read_profile(profile_name, Some(self.trans_id))
            .await
    }

    async fn edit_profile(
        &mut self,
        profile_name: &str,
        profile: &ProfileConfig,
    ) -> DeviceResult<()> {
        let trans_id = self.trans_id.to_string();
        self.client
            .execute(Method::PUT, &profile_path(profile_name), |request| {
                request.header(COORDINATION_HEADER, &trans_id).json(profile)
            })
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> DeviceResult<()> {
        // The commit itself must not carry the coordination header.
        let path = format!("{TRANSACTION_PATH}/{}", self.trans_id);
        self.client
            .execute(Method::PATCH, &path, |request| {
                request.json(&json!({ "state": "VALIDATING" }))
            })
            .await?;
        debug!("Committed transaction {} on {}", self.trans_id, self.client.name);
        Ok(())
    }
}
