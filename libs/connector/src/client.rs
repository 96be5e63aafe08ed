use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bfm_core::{Activity, ConnectorClient, ResourceResponse, SharedTokenProvider};
use reqwest::Url;
use tracing::debug;

/// Connector bound to one service URL, delivering activities over the
/// v3 conversations REST surface.
pub struct HttpConnectorClient {
    http: reqwest::Client,
    base_url: Url,
    service_url: String,
    credentials: SharedTokenProvider,
}

impl HttpConnectorClient {
    pub fn new(
        http: reqwest::Client,
        service_url: &str,
        credentials: SharedTokenProvider,
    ) -> Result<Self> {
        let normalized = if service_url.ends_with('/') {
            service_url.to_string()
        } else {
            format!("{service_url}/")
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("invalid service URL '{service_url}'"))?;
        Ok(Self {
            http,
            base_url,
            service_url: service_url.to_string(),
            credentials,
        })
    }

    fn conversation_id(activity: &Activity) -> Result<&str> {
        activity
            .conversation
            .as_ref()
            .map(|conversation| conversation.id.as_str())
            .context("activity is missing a conversation")
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.credentials.get_token().await?;
        Ok(if token.is_empty() {
            request
        } else {
            request.bearer_auth(token)
        })
    }

    async fn post_activity(
        &self,
        path: &str,
        activity: &Activity,
    ) -> Result<Option<ResourceResponse>> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("failed to resolve {path}"))?;
        let request = self.authorize(self.http.post(url).json(activity)).await?;
        let response = request.send().await.context("connector call failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("connector returned {status}: {body}");
        }
        // Some channels reply with an empty body; the adapter
        // synthesizes the resource response in that case.
        Ok(response.json().await.ok())
    }
}

#[async_trait]
impl ConnectorClient for HttpConnectorClient {
    async fn send_to_conversation(&self, activity: &Activity) -> Result<Option<ResourceResponse>> {
        let conversation_id = Self::conversation_id(activity)?;
        debug!(conversation_id, "sending activity to conversation");
        self.post_activity(&format!("v3/conversations/{conversation_id}/activities"), activity)
            .await
    }

    async fn reply_to_activity(&self, activity: &Activity) -> Result<Option<ResourceResponse>> {
        let conversation_id = Self::conversation_id(activity)?;
        let reply_to_id = activity
            .reply_to_id
            .as_deref()
            .context("activity is missing replyToId")?;
        debug!(conversation_id, reply_to_id, "replying to activity");
        self.post_activity(
            &format!("v3/conversations/{conversation_id}/activities/{reply_to_id}"),
            activity,
        )
        .await
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Option<ResourceResponse>> {
        let conversation_id = Self::conversation_id(activity)?;
        let activity_id = activity
            .id
            .as_deref()
            .context("activity is missing an id to update")?;
        let url = self
            .base_url
            .join(&format!(
                "v3/conversations/{conversation_id}/activities/{activity_id}"
            ))
            .context("failed to resolve update URL")?;
        let request = self.authorize(self.http.put(url).json(activity)).await?;
        let response = request.send().await.context("connector call failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("connector returned {status}: {body}");
        }
        Ok(response.json().await.ok())
    }

    async fn delete_activity(&self, conversation_id: &str, activity_id: &str) -> Result<()> {
        let url = self
            .base_url
            .join(&format!(
                "v3/conversations/{conversation_id}/activities/{activity_id}"
            ))
            .context("failed to resolve delete URL")?;
        let request = self.authorize(self.http.delete(url)).await?;
        let response = request.send().await.context("connector call failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("connector returned {status}: {body}");
        }
        Ok(())
    }

    fn service_url(&self) -> &str {
        &self.service_url
    }
}
