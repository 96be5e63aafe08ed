use crate::claims::{
    app_id_from_identity, is_skill_identity, is_skill_token, is_token_from_emulator,
};
use crate::constants::{
    ANONYMOUS_SKILL_APP_ID, APP_ID_CLAIM, AUDIENCE_CLAIM, CALLER_ID_BOT_PREFIX,
    CALLER_ID_PUBLIC_AZURE, CALLER_ID_US_GOV, OAUTH_URL, TO_BOT_FROM_CHANNEL_OPENID_METADATA_URL,
    TO_BOT_FROM_CHANNEL_TOKEN_ISSUER, TO_BOT_FROM_EMULATOR_OPENID_METADATA_URL,
    TO_CHANNEL_FROM_BOT_LOGIN_URL, TO_CHANNEL_FROM_BOT_OAUTH_SCOPE, government,
};
use crate::error::AuthError;
use crate::keys::{OpenIdKeyResolver, SharedKeyResolver};
use crate::validator::{
    authenticate_channel_token, authenticate_emulator_token, authenticate_skill_token,
};
use async_trait::async_trait;
use bfm_connector::{ParameterizedConnectorFactory, RestUserTokenClient};
use bfm_core::identity::ANONYMOUS_AUTH_TYPE;
use bfm_core::{
    Activity, ClaimsIdentity, SharedConnectorFactory, SharedCredentialFactory,
    SharedUserTokenClient, channels, role_types,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which cloud's trust authorities and endpoints to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudEnvironment {
    #[default]
    PublicCloud,
    UsGovernment,
}

impl CloudEnvironment {
    pub fn oauth_scope(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => TO_CHANNEL_FROM_BOT_OAUTH_SCOPE,
            CloudEnvironment::UsGovernment => government::TO_CHANNEL_FROM_BOT_OAUTH_SCOPE,
        }
    }

    pub fn login_url(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => TO_CHANNEL_FROM_BOT_LOGIN_URL,
            CloudEnvironment::UsGovernment => government::TO_CHANNEL_FROM_BOT_LOGIN_URL,
        }
    }

    pub fn channel_issuer(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
            CloudEnvironment::UsGovernment => government::TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
        }
    }

    pub fn channel_openid_metadata_url(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => TO_BOT_FROM_CHANNEL_OPENID_METADATA_URL,
            CloudEnvironment::UsGovernment => government::TO_BOT_FROM_CHANNEL_OPENID_METADATA_URL,
        }
    }

    pub fn emulator_openid_metadata_url(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => TO_BOT_FROM_EMULATOR_OPENID_METADATA_URL,
            CloudEnvironment::UsGovernment => government::TO_BOT_FROM_EMULATOR_OPENID_METADATA_URL,
        }
    }

    pub fn oauth_url(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => OAUTH_URL,
            CloudEnvironment::UsGovernment => government::OAUTH_URL,
        }
    }

    pub fn caller_id(&self) -> &'static str {
        match self {
            CloudEnvironment::PublicCloud => CALLER_ID_PUBLIC_AZURE,
            CloudEnvironment::UsGovernment => CALLER_ID_US_GOV,
        }
    }
}

/// Endpoint configuration for the authentication pipeline.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub cloud: CloudEnvironment,
    pub login_endpoint: String,
    pub oauth_url: String,
    pub validate_authority: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::for_cloud(CloudEnvironment::PublicCloud)
    }
}

impl AuthConfig {
    pub fn for_cloud(cloud: CloudEnvironment) -> Self {
        Self {
            cloud,
            login_endpoint: cloud.login_url().to_string(),
            oauth_url: cloud.oauth_url().to_string(),
            validate_authority: true,
        }
    }

    pub fn from_env() -> Self {
        let cloud = match std::env::var("CHANNEL_SERVICE").ok().as_deref() {
            Some(government::CHANNEL_SERVICE) => CloudEnvironment::UsGovernment,
            _ => CloudEnvironment::PublicCloud,
        };
        let mut config = Self::for_cloud(cloud);
        if let Some(login) = std::env::var("LOGIN_ENDPOINT").ok().filter(|v| !v.is_empty()) {
            config.login_endpoint = login;
        }
        if let Some(oauth) = std::env::var("OAUTH_URL").ok().filter(|v| !v.is_empty()) {
            config.oauth_url = oauth;
        }
        config
    }
}

/// Hook applied to every validated identity. Skill traffic with no
/// configured validator fails closed.
#[async_trait]
pub trait ClaimsValidator: Send + Sync {
    async fn validate_claims(&self, identity: &ClaimsIdentity) -> Result<(), AuthError>;
}

/// Accepts calls only from an allow-list of application ids; `*` admits
/// any caller.
pub struct AllowedCallersClaimsValidator {
    allowed: HashSet<String>,
}

impl AllowedCallersClaimsValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ClaimsValidator for AllowedCallersClaimsValidator {
    async fn validate_claims(&self, identity: &ClaimsIdentity) -> Result<(), AuthError> {
        if !is_skill_identity(identity) {
            return Ok(());
        }
        if self.allowed.contains("*") {
            return Ok(());
        }
        let caller = app_id_from_identity(identity)?;
        if self.allowed.contains(&caller) {
            Ok(())
        } else {
            Err(AuthError::CallerNotAllowed(caller))
        }
    }
}

/// Everything the turn driver needs after a request is authenticated.
/// Created once per inbound request and read-only thereafter.
pub struct AuthenticateRequestResult {
    pub claims_identity: ClaimsIdentity,
    pub outbound_audience: String,
    pub caller_id: Option<String>,
    pub connector_factory: SharedConnectorFactory,
}

impl std::fmt::Debug for AuthenticateRequestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticateRequestResult")
            .field("claims_identity", &self.claims_identity)
            .field("outbound_audience", &self.outbound_audience)
            .field("caller_id", &self.caller_id)
            .field("connector_factory", &"<connector factory>")
            .finish()
    }
}

/// Authenticates inbound requests against the channel, emulator,
/// government, and skill trust authorities, and builds the outbound
/// capability for the turn.
pub struct BotFrameworkAuthentication {
    config: AuthConfig,
    credential_factory: SharedCredentialFactory,
    claims_validator: Option<Arc<dyn ClaimsValidator>>,
    channel_keys: SharedKeyResolver,
    emulator_keys: SharedKeyResolver,
    http: reqwest::Client,
}

impl BotFrameworkAuthentication {
    pub fn new(config: AuthConfig, credential_factory: SharedCredentialFactory) -> Self {
        let http = reqwest::Client::new();
        let channel_keys = Arc::new(OpenIdKeyResolver::new(
            http.clone(),
            config.cloud.channel_openid_metadata_url(),
        ));
        let emulator_keys = Arc::new(OpenIdKeyResolver::new(
            http.clone(),
            config.cloud.emulator_openid_metadata_url(),
        ));
        Self {
            config,
            credential_factory,
            claims_validator: None,
            channel_keys,
            emulator_keys,
            http,
        }
    }

    pub fn with_claims_validator(mut self, validator: Arc<dyn ClaimsValidator>) -> Self {
        self.claims_validator = Some(validator);
        self
    }

    /// Swaps the OpenID-backed resolvers out, used by tests and
    /// self-hosted channel services.
    pub fn with_key_resolvers(
        mut self,
        channel_keys: SharedKeyResolver,
        emulator_keys: SharedKeyResolver,
    ) -> Self {
        self.channel_keys = channel_keys;
        self.emulator_keys = emulator_keys;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Audience used for channel-bound traffic when the caller is not a
    /// skill.
    pub fn originating_audience(&self) -> &str {
        self.config.cloud.oauth_scope()
    }

    /// Authenticates an inbound activity request end-to-end.
    pub async fn authenticate_request(
        &self,
        activity: &Activity,
        auth_header: &str,
    ) -> Result<AuthenticateRequestResult, AuthError> {
        let identity = if auth_header.trim().is_empty() {
            self.anonymous_identity(Some(activity)).await?
        } else {
            let service_url = Some(activity.service_url.as_str()).filter(|url| !url.is_empty());
            self.validate_auth_header(auth_header, service_url).await?
        };
        self.finish_authentication(identity).await
    }

    /// Transport-agnostic variant for streaming/socket entry points; a
    /// non-blank channel id header is required.
    pub async fn authenticate_streaming_request(
        &self,
        auth_header: &str,
        channel_id_header: &str,
    ) -> Result<AuthenticateRequestResult, AuthError> {
        if channel_id_header.trim().is_empty() {
            return Err(AuthError::MissingChannelId);
        }
        let identity = if auth_header.trim().is_empty() {
            self.anonymous_identity(None).await?
        } else {
            self.validate_auth_header(auth_header, None).await?
        };
        self.finish_authentication(identity).await
    }

    async fn finish_authentication(
        &self,
        identity: ClaimsIdentity,
    ) -> Result<AuthenticateRequestResult, AuthError> {
        match &self.claims_validator {
            Some(validator) => validator.validate_claims(&identity).await?,
            None if is_skill_identity(&identity) => {
                return Err(AuthError::MissingClaimsValidator);
            }
            None => {}
        }

        let outbound_audience = if is_skill_identity(&identity) {
            app_id_from_identity(&identity)?
        } else {
            self.originating_audience().to_string()
        };
        let caller_id = self.generate_caller_id(&identity).await?;
        let connector_factory = self.create_connector_factory(&identity);

        debug!(
            authenticated = identity.is_authenticated(),
            outbound_audience, "request authenticated"
        );
        Ok(AuthenticateRequestResult {
            claims_identity: identity,
            outbound_audience,
            caller_id,
            connector_factory,
        })
    }

    async fn anonymous_identity(
        &self,
        activity: Option<&Activity>,
    ) -> Result<ClaimsIdentity, AuthError> {
        let disabled = self
            .credential_factory
            .is_authentication_disabled()
            .await
            .map_err(AuthError::Credentials)?;
        if !disabled {
            return Err(AuthError::MissingAuthHeader);
        }
        warn!("authentication is disabled; accepting anonymous request");

        // An emulator activity addressed to a skill recipient gets a
        // skill-flavored anonymous identity so downstream audience
        // selection still works.
        let is_anonymous_skill = activity.is_some_and(|activity| {
            activity.channel_id == channels::EMULATOR
                && activity
                    .recipient
                    .as_ref()
                    .and_then(|recipient| recipient.role.as_deref())
                    == Some(role_types::SKILL)
        });
        Ok(if is_anonymous_skill {
            ClaimsIdentity::new(
                ANONYMOUS_AUTH_TYPE,
                vec![(APP_ID_CLAIM, ANONYMOUS_SKILL_APP_ID)],
            )
        } else {
            ClaimsIdentity::anonymous()
        })
    }

    async fn validate_auth_header(
        &self,
        auth_header: &str,
        service_url: Option<&str>,
    ) -> Result<ClaimsIdentity, AuthError> {
        let credentials = self.credential_factory.as_ref();
        if is_skill_token(auth_header) {
            return authenticate_skill_token(auth_header, credentials, self.emulator_keys.as_ref())
                .await;
        }
        if is_token_from_emulator(auth_header) {
            return authenticate_emulator_token(
                auth_header,
                credentials,
                self.emulator_keys.as_ref(),
            )
            .await;
        }
        authenticate_channel_token(
            auth_header,
            credentials,
            self.channel_keys.as_ref(),
            self.config.cloud.channel_issuer(),
            service_url,
        )
        .await
    }

    async fn generate_caller_id(
        &self,
        identity: &ClaimsIdentity,
    ) -> Result<Option<String>, AuthError> {
        let disabled = self
            .credential_factory
            .is_authentication_disabled()
            .await
            .map_err(AuthError::Credentials)?;
        if disabled {
            return Ok(None);
        }
        if is_skill_identity(identity) {
            let app_id = app_id_from_identity(identity)?;
            return Ok(Some(format!("{CALLER_ID_BOT_PREFIX}{app_id}")));
        }
        Ok(Some(self.config.cloud.caller_id().to_string()))
    }

    /// Builds a connector factory bound to the identity's application.
    pub fn create_connector_factory(&self, identity: &ClaimsIdentity) -> SharedConnectorFactory {
        let app_id = identity
            .claim_value(AUDIENCE_CLAIM)
            .or_else(|| identity.claim_value(APP_ID_CLAIM))
            .unwrap_or_default()
            .to_string();
        Arc::new(ParameterizedConnectorFactory::new(
            app_id,
            self.config.cloud.oauth_scope(),
            self.config.login_endpoint.clone(),
            self.config.validate_authority,
            self.credential_factory.clone(),
            self.http.clone(),
        ))
    }

    /// Builds a user-token client scoped to the identity's application.
    pub async fn create_user_token_client(
        &self,
        identity: &ClaimsIdentity,
    ) -> Result<SharedUserTokenClient, AuthError> {
        let app_id = identity
            .claim_value(AUDIENCE_CLAIM)
            .or_else(|| identity.claim_value(APP_ID_CLAIM))
            .unwrap_or_default();
        let credentials = self
            .credential_factory
            .create_credentials(
                app_id,
                Some(self.config.cloud.oauth_scope()),
                &self.config.login_endpoint,
                self.config.validate_authority,
            )
            .await
            .map_err(AuthError::Credentials)?;
        let client = RestUserTokenClient::new(self.http.clone(), &self.config.oauth_url, credentials)
            .map_err(AuthError::Credentials)?;
        Ok(Arc::new(client))
    }
}
