//! Browser-based OAuth2 authorization code grant with a loopback redirect.
//!
//! Opens Google's consent page, waits on a one-shot local listener for the
//! redirect, then trades the authorization code for tokens. There is no
//! timeout: the flow blocks until the user finishes or the callback reports an
//! error.
//!
//! Endpoints and the redirect URI come from the client secret file when it
//! names them; the configuration only fills the gaps.

use super::token::{AppCredentials, ClientKey, GrantedTokens, TokenResponse};
use crate::config::Config;
use crate::error::{authorization_error, AppResult};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

/// Text shown in the browser once the redirect has been received
const CALLBACK_PAGE: &str = "Authorization received! You can close this window.";

/// Where Google sends the browser back to, and the port our listener binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub uri: String,
    pub port: u16,
}

/// Everything needed to run one consent ceremony
#[derive(Debug, Clone)]
pub struct ConsentFlow {
    credentials_path: PathBuf,
    scopes: Vec<String>,
    auth_url: String,
    token_url: String,
    fallback_redirect: Redirect,
    client: Client,
}

impl ConsentFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            credentials_path: config.credentials_path.clone(),
            scopes: config.scopes.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            fallback_redirect: Redirect {
                uri: config.redirect_uri(),
                port: config.consent_port,
            },
            client: Client::new(),
        }
    }

    /// Run the whole ceremony and return the granted tokens
    ///
    /// Fails if the user denies access or Google returns no refresh token.
    pub async fn run(&self) -> AppResult<GrantedTokens> {
        let key = self.client_key()?;
        let redirect = resolve_redirect(&key, &self.fallback_redirect)?;

        let code = self.receive_code(&key, &redirect).await?;

        info!("Received authorization code, exchanging for tokens");
        self.exchange_code(&key, &code, &redirect.uri).await
    }

    /// Trade an authorization code obtained elsewhere for tokens
    pub async fn redeem(&self, code: &str, redirect_uri: &str) -> AppResult<GrantedTokens> {
        let key = self.client_key()?;
        self.exchange_code(&key, code, redirect_uri).await
    }

    fn client_key(&self) -> AppResult<ClientKey> {
        Ok(AppCredentials::read(&self.credentials_path)?.key()?.clone())
    }

    /// Open the consent page and block until the redirect delivers a code
    async fn receive_code(&self, key: &ClientKey, redirect: &Redirect) -> AppResult<String> {
        // Generate random state for security
        let state = uuid::Uuid::new_v4().to_string();
        let auth_base = key.auth_uri.as_deref().unwrap_or(&self.auth_url);
        let auth_url = authorization_url(auth_base, &key.client_id, &redirect.uri, &self.scopes, &state)?;

        // Bind before opening the browser so the redirect cannot arrive too early
        let server = tiny_http::Server::http(("127.0.0.1", redirect.port)).map_err(|e| {
            authorization_error(&format!("Failed to listen on port {}: {}", redirect.port, e))
        })?;

        info!("Opening browser for Google Calendar authorization");
        debug!("Authorization URL: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        info!("Waiting for authorization callback on {}", redirect.uri);
        tokio::task::spawn_blocking(move || wait_for_code(server, &state))
            .await
            .map_err(|e| authorization_error(&format!("Callback listener failed: {}", e)))?
    }

    async fn exchange_code(
        &self,
        key: &ClientKey,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<GrantedTokens> {
        let token_url = key.token_uri.as_deref().unwrap_or(&self.token_url);

        let response = self
            .client
            .post(token_url)
            .form(&[
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| authorization_error(&format!("Failed to exchange code: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(authorization_error(&format!(
                "Failed to get token: HTTP {} - {}",
                status, error_text
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| authorization_error(&format!("Failed to parse token response: {}", e)))?;

        GrantedTokens::try_from(token)
    }
}

/// Pick the redirect URI registered in the client secret file, if any
///
/// Only plain-http loopback URIs can reach our listener. A registered URI
/// without a port gets the configured consent port.
pub fn resolve_redirect(key: &ClientKey, fallback: &Redirect) -> AppResult<Redirect> {
    let Some(registered) = key.redirect_uris.first() else {
        return Ok(fallback.clone());
    };

    let mut url = Url::parse(registered).map_err(|e| {
        authorization_error(&format!("Invalid redirect URI {}: {}", registered, e))
    })?;

    let loopback = url.scheme() == "http"
        && matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
    if !loopback {
        return Err(authorization_error(&format!(
            "Registered redirect URI {} is not a loopback address",
            registered
        )));
    }

    let port = url.port().unwrap_or(fallback.port);
    url.set_port(Some(port))
        .map_err(|_| authorization_error(&format!("Cannot set port on {}", registered)))?;

    Ok(Redirect {
        uri: url.to_string(),
        port,
    })
}

/// Build the consent page URL
pub fn authorization_url(
    base: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> AppResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| authorization_error(&format!("Invalid authorization URL {}: {}", base, e)))?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state);

    Ok(url)
}

/// Inspect one request to the loopback listener
///
/// Returns `None` for requests that are not the OAuth redirect (favicon and the like).
pub fn parse_callback(request_url: &str, expected_state: &str) -> Option<AppResult<String>> {
    let url = Url::parse("http://127.0.0.1").ok()?.join(request_url).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(authorization_error(&format!("Consent was not granted: {}", error))));
    }

    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(authorization_error("OAuth state mismatch in callback")));
    }

    Some(Ok(code))
}

/// Block on the listener until the redirect arrives
fn wait_for_code(server: tiny_http::Server, state: &str) -> AppResult<String> {
    loop {
        let request = server.recv()?;
        let result = parse_callback(request.url(), state);

        let body = match &result {
            Some(Ok(_)) => CALLBACK_PAGE.to_string(),
            Some(Err(e)) => e.to_string(),
            None => String::new(),
        };
        if let Err(e) = request.respond(tiny_http::Response::from_string(body)) {
            warn!("Failed to answer callback request: {}", e);
        }

        if let Some(result) = result {
            return result;
        }
    }
}
