use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bfm_core::{SharedTokenProvider, TokenResponse, UserTokenClient};
use reqwest::{StatusCode, Url};
use tracing::debug;

/// User-token client over the token service REST surface.
pub struct RestUserTokenClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: SharedTokenProvider,
}

impl RestUserTokenClient {
    pub fn new(
        http: reqwest::Client,
        oauth_url: &str,
        credentials: SharedTokenProvider,
    ) -> Result<Self> {
        let normalized = if oauth_url.ends_with('/') {
            oauth_url.to_string()
        } else {
            format!("{oauth_url}/")
        };
        let base_url =
            Url::parse(&normalized).with_context(|| format!("invalid OAuth URL '{oauth_url}'"))?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.credentials.get_token().await?;
        Ok(if token.is_empty() {
            request
        } else {
            request.bearer_auth(token)
        })
    }
}

#[async_trait]
impl UserTokenClient for RestUserTokenClient {
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        channel_id: &str,
        magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>> {
        let mut url = self
            .base_url
            .join("api/usertoken/GetToken")
            .context("failed to resolve GetToken")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("userId", user_id);
            query.append_pair("connectionName", connection_name);
            query.append_pair("channelId", channel_id);
            if let Some(code) = magic_code {
                query.append_pair("code", code);
            }
        }
        let request = self.authorize(self.http.get(url)).await?;
        let response = request.send().await.context("user token call failed")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                debug!(user_id, connection_name, channel_id, "user token retrieved");
                Ok(response.json().await.ok())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                bail!("user token service returned {status}: {body}");
            }
        }
    }

    async fn sign_out_user(
        &self,
        user_id: &str,
        connection_name: &str,
        channel_id: &str,
    ) -> Result<()> {
        let mut url = self
            .base_url
            .join("api/usertoken/SignOut")
            .context("failed to resolve SignOut")?;
        url.query_pairs_mut()
            .append_pair("userId", user_id)
            .append_pair("connectionName", connection_name)
            .append_pair("channelId", channel_id);
        let request = self.authorize(self.http.delete(url)).await?;
        let response = request.send().await.context("user token call failed")?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("user token service returned {status}: {body}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfm_core::AnonymousTokenProvider;
    use std::sync::Arc;

    #[test]
    fn base_url_joins_token_paths() {
        let client = RestUserTokenClient::new(
            reqwest::Client::new(),
            "https://api.example.com",
            Arc::new(AnonymousTokenProvider),
        )
        .unwrap();
        let joined = client.base_url.join("api/usertoken/GetToken").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://api.example.com/api/usertoken/GetToken"
        );
    }
}
