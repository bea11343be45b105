//! Google OAuth credential source
//!
//! Owns the authorization handle for the whole process: loads the persisted
//! token record on first use, refreshes the access token lazily, and runs the
//! interactive authorization exchange only when nothing usable is persisted.
//! All token state lives behind a single async mutex, so refreshes are
//! serialized — concurrent callers wait for the in-flight refresh instead of
//! issuing their own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chime_core::CredentialSource;
use chime_domain::{AuthConfig, AuthError, BridgeError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Durable token record, read on startup and rewritten on every issue or
/// refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredTokens {
    fn is_expired(&self, threshold_seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= self.expires_at
    }
}

/// Operator-facing one-time-code exchange. Implementations present the
/// authorization URL and block until the operator supplies the code.
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    async fn obtain_code(&self, authorization_url: &str) -> std::result::Result<String, AuthError>;
}

#[async_trait]
impl<T: AuthorizationPrompt + ?Sized> AuthorizationPrompt for Arc<T> {
    async fn obtain_code(&self, authorization_url: &str) -> std::result::Result<String, AuthError> {
        (**self).obtain_code(authorization_url).await
    }
}

/// Prompt on the controlling terminal: print the URL, read the code from
/// stdin. First-run only; a persisted token record makes this unreachable.
pub struct StdinPrompt;

#[async_trait]
impl AuthorizationPrompt for StdinPrompt {
    async fn obtain_code(&self, authorization_url: &str) -> std::result::Result<String, AuthError> {
        println!("Authorize this application by visiting:\n\n  {authorization_url}\n");
        println!("Paste the one-time code here and press enter:");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| AuthError::Interactive(format!("failed to read code: {e}")))?;

        let code = line.trim().to_string();
        if code.is_empty() {
            return Err(AuthError::Interactive("authorization abandoned, no code entered".into()));
        }
        Ok(code)
    }
}

/// Credential source backed by Google's OAuth token endpoint and a local
/// token file.
pub struct GoogleCredentialSource {
    config: AuthConfig,
    client: Client,
    prompt: Box<dyn AuthorizationPrompt>,
    token_path: PathBuf,
    state: Mutex<Option<StoredTokens>>,
}

impl GoogleCredentialSource {
    /// Build a credential source from auth configuration.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` when the OAuth client credentials are
    /// missing.
    pub fn new(config: AuthConfig, prompt: Box<dyn AuthorizationPrompt>) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(BridgeError::Config(
                "OAuth client_id and client_secret must be configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {e}")))?;

        let token_path = PathBuf::from(&config.token_path);

        Ok(Self { config, client, prompt, token_path, state: Mutex::new(None) })
    }

    /// URL the operator must visit to authorize the application.
    fn authorization_url(&self) -> std::result::Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.config.authorization_endpoint,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", &self.config.scopes.join(" ")),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AuthError::Interactive(format!("invalid authorization endpoint: {e}")))?;

        Ok(url.into())
    }

    /// Load the persisted record, or run the interactive exchange when none
    /// exists. Caller holds the state lock.
    async fn load_or_authorize(&self) -> std::result::Result<StoredTokens, AuthError> {
        match tokio::fs::read(&self.token_path).await {
            Ok(bytes) => {
                let tokens: StoredTokens = serde_json::from_slice(&bytes).map_err(|e| {
                    AuthError::Storage(format!(
                        "corrupt token record at {}: {e}",
                        self.token_path.display()
                    ))
                })?;
                info!(path = %self.token_path.display(), "loaded persisted authorization");
                Ok(tokens)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no persisted authorization, starting interactive exchange");
                self.interactive_exchange().await
            }
            Err(err) => Err(AuthError::Storage(format!(
                "cannot read token record at {}: {err}",
                self.token_path.display()
            ))),
        }
    }

    async fn interactive_exchange(&self) -> std::result::Result<StoredTokens, AuthError> {
        let authorization_url = self.authorization_url()?;
        let code = self.prompt.obtain_code(&authorization_url).await?;

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("token request failed: {e}")))?;

        let tokens = parse_token_response(response, AuthError::Exchange).await?;
        self.persist(&tokens).await?;
        info!(path = %self.token_path.display(), "authorization persisted");
        Ok(tokens)
    }

    /// Exchange the refresh token for a new access token. Caller holds the
    /// state lock.
    async fn refresh(
        &self,
        current: &StoredTokens,
    ) -> std::result::Result<StoredTokens, AuthError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Refresh("no refresh token in stored record".into()))?;

        debug!("refreshing access token");
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(format!("refresh request failed: {e}")))?;

        let mut refreshed = parse_token_response(response, AuthError::Refresh).await?;
        // Google omits the refresh token on refresh responses; keep the
        // original grant.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = current.refresh_token.clone();
        }

        self.persist(&refreshed).await?;
        info!("access token refreshed");
        Ok(refreshed)
    }

    async fn persist(&self, tokens: &StoredTokens) -> std::result::Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| AuthError::Storage(format!("cannot serialize token record: {e}")))?;
        tokio::fs::write(&self.token_path, json).await.map_err(|e| {
            AuthError::Storage(format!(
                "cannot write token record at {}: {e}",
                self.token_path.display()
            ))
        })
    }
}

#[async_trait]
impl CredentialSource for GoogleCredentialSource {
    async fn access_token(&self) -> std::result::Result<String, AuthError> {
        let mut state = self.state.lock().await;

        if state.is_none() {
            *state = Some(self.load_or_authorize().await?);
        }

        // The lock stays held through the refresh, so a burst of expired
        // callers produces exactly one token-endpoint request.
        if let Some(tokens) = state.as_ref() {
            if tokens.is_expired(self.config.refresh_threshold_seconds) {
                let refreshed = self.refresh(tokens).await?;
                *state = Some(refreshed);
            }
        }

        state
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| AuthError::Storage("token state empty after load".into()))
    }

    async fn refresh_access_token(&self) -> std::result::Result<String, AuthError> {
        let mut state = self.state.lock().await;

        let current = match state.take() {
            Some(tokens) => tokens,
            None => self.load_or_authorize().await?,
        };

        let refreshed = self.refresh(&current).await?;
        let access_token = refreshed.access_token.clone();
        *state = Some(refreshed);
        Ok(access_token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

async fn parse_token_response(
    response: reqwest::Response,
    wrap: fn(String) -> AuthError,
) -> std::result::Result<StoredTokens, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
        return Err(wrap(format!("token endpoint returned {status}: {body}")));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| wrap(format!("unreadable token response: {e}")))?;

    Ok(StoredTokens {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
    })
}
