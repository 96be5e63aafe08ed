use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bfm_core::{AnonymousTokenProvider, CredentialFactory, SharedTokenProvider, TokenProvider};
use serde::Deserialize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::debug;

/// Credential factory for a bot with a single application identity.
///
/// An empty (or absent) app id means authentication is disabled
/// globally; validators then accept anonymous traffic and outbound
/// calls go out with empty tokens.
pub struct PasswordCredentialFactory {
    app_id: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl PasswordCredentialFactory {
    pub fn new(app_id: Option<String>, password: Option<String>) -> Self {
        Self {
            app_id: app_id.filter(|id| !id.is_empty()),
            password,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let app_id = std::env::var("BOT_APP_ID").ok().filter(|v| !v.is_empty());
        let password = std::env::var("BOT_APP_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty());
        Self::new(app_id, password)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl CredentialFactory for PasswordCredentialFactory {
    async fn is_valid_app_id(&self, app_id: &str) -> Result<bool> {
        Ok(self.app_id.as_deref() == Some(app_id))
    }

    async fn is_authentication_disabled(&self) -> Result<bool> {
        Ok(self.app_id.is_none())
    }

    async fn create_credentials(
        &self,
        app_id: &str,
        audience: Option<&str>,
        login_endpoint: &str,
        validate_authority: bool,
    ) -> Result<SharedTokenProvider> {
        if self.app_id.is_none() {
            return Ok(Arc::new(AnonymousTokenProvider));
        }
        if self.app_id.as_deref() != Some(app_id) {
            bail!("credentials requested for unknown app id '{app_id}'");
        }
        let password = self
            .password
            .clone()
            .context("app password is required when authentication is enabled")?;
        let audience = audience
            .filter(|aud| !aud.is_empty())
            .context("audience is required for credential creation")?;
        Ok(Arc::new(ClientCredentials::new(
            self.http.clone(),
            app_id.to_string(),
            password,
            login_endpoint.to_string(),
            audience.to_string(),
            validate_authority,
        )))
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: OffsetDateTime,
}

/// Client-credentials grant against the login endpoint, with the issued
/// token cached until shortly before expiry.
#[derive(Debug)]
pub struct ClientCredentials {
    http: reqwest::Client,
    app_id: String,
    password: String,
    login_endpoint: String,
    audience: String,
    validate_authority: bool,
    cache: Mutex<Option<CachedToken>>,
}

const TOKEN_REFRESH_MARGIN: Duration = Duration::minutes(5);

impl ClientCredentials {
    pub fn new(
        http: reqwest::Client,
        app_id: String,
        password: String,
        login_endpoint: String,
        audience: String,
        validate_authority: bool,
    ) -> Self {
        Self {
            http,
            app_id,
            password,
            login_endpoint,
            audience,
            validate_authority,
            cache: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/oauth2/v2.0/token",
            self.login_endpoint.trim_end_matches('/')
        )
    }

    async fn request_token(&self) -> Result<TokenGrantResponse> {
        let scope = format!("{}/.default", self.audience);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.password.as_str()),
            ("scope", scope.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .context("failed to call token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("token endpoint returned {status}: {body}");
        }
        response
            .json()
            .await
            .context("token endpoint returned invalid JSON")
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn get_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at - OffsetDateTime::now_utc() > TOKEN_REFRESH_MARGIN {
                return Ok(cached.token.clone());
            }
        }

        let granted = self.request_token().await?;
        debug!(
            app_id = %self.app_id,
            audience = %self.audience,
            validate_authority = self.validate_authority,
            "acquired outbound token"
        );
        let token = granted.access_token.clone();
        *cache = Some(CachedToken {
            token: granted.access_token,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(granted.expires_in),
        });
        Ok(token)
    }

    fn app_id(&self) -> Option<&str> {
        Some(&self.app_id)
    }
}
