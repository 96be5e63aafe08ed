use crate::client::HttpConnectorClient;
use anyhow::Result;
use async_trait::async_trait;
use bfm_core::{ConnectorFactory, SharedConnectorClient, SharedCredentialFactory};
use std::sync::Arc;

/// Connector factory bound to one application identity, login endpoint,
/// and default outbound scope. Each `create` call asks the credential
/// factory for credentials scoped to the requested audience and wraps
/// them in a connector for the service URL.
pub struct ParameterizedConnectorFactory {
    app_id: String,
    default_scope: String,
    login_endpoint: String,
    validate_authority: bool,
    credential_factory: SharedCredentialFactory,
    http: reqwest::Client,
}

impl ParameterizedConnectorFactory {
    pub fn new(
        app_id: impl Into<String>,
        default_scope: impl Into<String>,
        login_endpoint: impl Into<String>,
        validate_authority: bool,
        credential_factory: SharedCredentialFactory,
        http: reqwest::Client,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            default_scope: default_scope.into(),
            login_endpoint: login_endpoint.into(),
            validate_authority,
            credential_factory,
            http,
        }
    }
}

#[async_trait]
impl ConnectorFactory for ParameterizedConnectorFactory {
    async fn create(&self, service_url: &str, audience: &str) -> Result<SharedConnectorClient> {
        let scope = if audience.is_empty() {
            self.default_scope.as_str()
        } else {
            audience
        };
        let credentials = self
            .credential_factory
            .create_credentials(
                &self.app_id,
                Some(scope),
                &self.login_endpoint,
                self.validate_authority,
            )
            .await?;
        let client = HttpConnectorClient::new(self.http.clone(), service_url, credentials)?;
        Ok(Arc::new(client))
    }
}
