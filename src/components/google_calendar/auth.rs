use super::consent::ConsentFlow;
use super::token::{GrantedTokens, OAuthClient, TokenStore};
use crate::config::Config;
use crate::error::AppResult;
use async_trait::async_trait;
use tracing::{info, warn};

/// Source of bearer credentials for the calendar client
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Credentials saved by an earlier authorization, if any are usable
    async fn load_existing(&self) -> Option<OAuthClient>;

    /// Run a consent ceremony and persist what it yields
    async fn obtain_interactively(&self) -> AppResult<OAuthClient>;
}

/// Where the authorization flow ended up
pub enum AuthState {
    Unauthenticated,
    Authenticated(OAuthClient),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Load saved credentials, falling back to interactive consent
///
/// There is no retry: a failed consent flow is returned to the caller as is.
pub async fn authorize(provider: &dyn CredentialProvider) -> AppResult<OAuthClient> {
    let mut state = AuthState::Unauthenticated;

    if let Some(client) = provider.load_existing().await {
        state = AuthState::Authenticated(client);
    }

    match state {
        AuthState::Authenticated(client) => Ok(client),
        AuthState::Unauthenticated => {
            info!("No saved credentials, starting interactive authorization");
            let client = provider.obtain_interactively().await?;
            info!("Authorization complete");
            Ok(client)
        }
    }
}

/// Token file on disk plus the browser consent flow
pub struct FileCredentialProvider {
    store: TokenStore,
    consent: ConsentFlow,
    token_url: String,
}

impl FileCredentialProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            store: TokenStore::new(&config.token_path, &config.credentials_path),
            consent: ConsentFlow::new(config),
            token_url: config.token_url.clone(),
        }
    }

    pub fn consent(&self) -> &ConsentFlow {
        &self.consent
    }

    /// Save a fresh grant and return a client already holding its access token
    pub async fn persist(&self, grant: GrantedTokens) -> AppResult<OAuthClient> {
        let user = match self.store.save(&grant.refresh_token).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed to persist credentials: {}", e);
                return Err(e);
            }
        };

        Ok(OAuthClient::new(user, self.token_url.clone()).with_access_token(grant.access_token))
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn load_existing(&self) -> Option<OAuthClient> {
        self.store
            .load()
            .await
            .map(|user| OAuthClient::new(user, self.token_url.clone()))
    }

    async fn obtain_interactively(&self) -> AppResult<OAuthClient> {
        let grant = self.consent.run().await?;
        self.persist(grant).await
    }
}
