use crate::error::{authorization_error, credentials_error, AppResult};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Value of the `type` field in a persisted token file
pub const AUTHORIZED_USER: &str = "authorized_user";

/// Refresh this long before Google says the access token expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Saved credentials for the single authorized user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// One entry of the client secret file downloaded from the Google cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientKey {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// The client secret file, holding either an `installed` or a `web` key
#[derive(Debug, Clone, Deserialize)]
pub struct AppCredentials {
    pub installed: Option<ClientKey>,
    pub web: Option<ClientKey>,
}

impl AppCredentials {
    /// Read and parse the client secret file
    pub fn read(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            credentials_error(&format!("Failed to read {}: {}", path.display(), e))
        })?;
        let keys: AppCredentials = serde_json::from_str(&content)?;
        Ok(keys)
    }

    /// The usable key, preferring `installed` over `web`
    pub fn key(&self) -> AppResult<&ClientKey> {
        self.installed
            .as_ref()
            .or(self.web.as_ref())
            .ok_or_else(|| credentials_error("Client secret file has neither an 'installed' nor a 'web' key"))
    }
}

/// A short-lived bearer token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build a token from an `expires_in` seconds value
    ///
    /// Lifetimes beyond what `DateTime` can represent are clamped.
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        let secs = expires_in.saturating_sub(EXPIRY_MARGIN_SECS);
        let expires_at = Duration::try_seconds(secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .unwrap_or(if secs < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });

        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Response body of Google's token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// What a completed consent ceremony hands back
#[derive(Debug, Clone)]
pub struct GrantedTokens {
    pub refresh_token: String,
    pub access_token: AccessToken,
}

impl TryFrom<TokenResponse> for GrantedTokens {
    type Error = crate::error::Error;

    fn try_from(token: TokenResponse) -> AppResult<Self> {
        let refresh_token = token.refresh_token.ok_or_else(|| {
            authorization_error("Token response has no refresh token; revoke the app's access and try again")
        })?;

        Ok(Self {
            refresh_token,
            access_token: AccessToken::new(token.access_token, token.expires_in),
        })
    }
}

/// Bearer credentials for calling Google APIs on the user's behalf
///
/// Holds the refresh token and mints access tokens from it as needed.
#[derive(Clone)]
pub struct OAuthClient {
    credentials: AuthorizedUser,
    token_url: String,
    client: Client,
    access: Arc<RwLock<Option<AccessToken>>>,
}

impl OAuthClient {
    pub fn new(credentials: AuthorizedUser, token_url: impl Into<String>) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            client: Client::new(),
            access: Arc::new(RwLock::new(None)),
        }
    }

    /// Seed the client with an access token obtained during consent
    pub fn with_access_token(self, token: AccessToken) -> Self {
        Self {
            access: Arc::new(RwLock::new(Some(token))),
            ..self
        }
    }

    pub fn credentials(&self) -> &AuthorizedUser {
        &self.credentials
    }

    /// Get a valid access token, refreshing it when missing or expired
    pub async fn bearer_token(&self) -> AppResult<String> {
        {
            let access = self.access.read().await;
            if let Some(token) = access.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut access = self.access.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = access.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let token = self.refresh().await?;
        let bearer = token.access_token.clone();
        *access = Some(token);
        Ok(bearer)
    }

    /// Exchange the refresh token for a new access token
    async fn refresh(&self) -> AppResult<AccessToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| authorization_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(authorization_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| authorization_error(&format!("Failed to parse token response: {}", e)))?;

        debug!("Refreshed access token, valid for {}s", token.expires_in);
        Ok(AccessToken::new(token.access_token, token.expires_in))
    }
}

/// File-backed storage for the authorized user's credentials
#[derive(Debug, Clone)]
pub struct TokenStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl TokenStore {
    pub fn new(token_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            credentials_path: credentials_path.into(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Read saved credentials; any failure counts as "no credentials"
    pub async fn load(&self) -> Option<AuthorizedUser> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No usable token file at {}: {}", self.token_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<AuthorizedUser>(&content) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Ignoring malformed token file {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    /// Combine the app's client id/secret with a refresh token and persist the result
    ///
    /// Overwrites any previous token file.
    pub async fn save(&self, refresh_token: &str) -> AppResult<AuthorizedUser> {
        let keys = AppCredentials::read(&self.credentials_path)?;
        let key = keys.key()?;

        let user = AuthorizedUser {
            kind: AUTHORIZED_USER.to_string(),
            client_id: key.client_id.clone(),
            client_secret: key.client_secret.clone(),
            refresh_token: refresh_token.to_string(),
        };

        let payload = serde_json::to_string(&user)?;

        // Write to a private temp file first, then rename so readers never see a partial file
        let temp_path = self
            .token_path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = write_private(&temp_path, payload.as_bytes()).await {
            remove_temp(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &self.token_path).await {
            remove_temp(&temp_path).await;
            return Err(e.into());
        }

        info!("Saved credentials to {}", self.token_path.display());
        Ok(user)
    }
}

/// Create `path` readable by the owner only and write `contents` to it
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

async fn remove_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove temp file {}: {}", path.display(), e);
    }
}
