use crate::activity::{Activity, ResourceResponse};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared connector handle stored in turn state.
pub type SharedConnectorClient = Arc<dyn ConnectorClient>;
/// Shared user-token handle stored in turn state.
pub type SharedUserTokenClient = Arc<dyn UserTokenClient>;
/// Shared factory handle carried by an authentication result.
pub type SharedConnectorFactory = Arc<dyn ConnectorFactory>;

/// Outbound client bound to one service URL, used to deliver the turn's
/// side effects back to the channel.
#[async_trait]
pub trait ConnectorClient: Send + Sync {
    /// POSTs a new activity into the conversation.
    async fn send_to_conversation(&self, activity: &Activity) -> Result<Option<ResourceResponse>>;

    /// POSTs an activity as a reply to `activity.reply_to_id`.
    async fn reply_to_activity(&self, activity: &Activity) -> Result<Option<ResourceResponse>>;

    /// Replaces an existing activity in place.
    async fn update_activity(&self, activity: &Activity) -> Result<Option<ResourceResponse>>;

    /// Removes an activity from the conversation.
    async fn delete_activity(&self, conversation_id: &str, activity_id: &str) -> Result<()>;

    /// Service URL this client is bound to.
    fn service_url(&self) -> &str;
}

/// User token handed back by the token service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

/// Narrow client for per-user OAuth token operations.
#[async_trait]
pub trait UserTokenClient: Send + Sync {
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        channel_id: &str,
        magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>>;

    async fn sign_out_user(
        &self,
        user_id: &str,
        connection_name: &str,
        channel_id: &str,
    ) -> Result<()>;
}

/// Produces outbound connectors scoped to a service URL and audience.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn create(&self, service_url: &str, audience: &str) -> Result<SharedConnectorClient>;
}
