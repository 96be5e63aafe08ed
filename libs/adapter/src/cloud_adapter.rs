use crate::bot::BotHandler;
use crate::error::AdapterError;
use anyhow::Result;
use async_trait::async_trait;
use bfm_auth::BotFrameworkAuthentication;
use bfm_auth::constants::{APP_ID_CLAIM, AUDIENCE_CLAIM};
use bfm_auth::orchestrator::AuthenticateRequestResult;
use bfm_core::identity::ANONYMOUS_AUTH_TYPE;
use bfm_core::{
    Activity, ActivitySender, ActivityType, ClaimsIdentity, ConversationReference, DeleteHook,
    DeliveryMode, ExpectedReplies, InvokeResponse, ResourceResponse, SendHook, TurnContext,
    TurnState, UpdateHook, channels,
};
use bfm_telemetry::{TelemetryLabels, record_counter};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pause applied to a delay activity that carries no duration.
const DEFAULT_DELAY_MS: u64 = 1000;
/// Status reported when an invoke turn produced no invoke response.
const STATUS_NOT_IMPLEMENTED: u16 = 501;

/// Drives one turn end-to-end: authenticate, build the outbound
/// capability, run the bot callback, and reconcile side effects into a
/// protocol-correct response.
pub struct CloudAdapter {
    auth: Arc<BotFrameworkAuthentication>,
    sender: Arc<AdapterSender>,
    send_hooks: Vec<Arc<dyn SendHook>>,
    update_hooks: Vec<Arc<dyn UpdateHook>>,
    delete_hooks: Vec<Arc<dyn DeleteHook>>,
}

impl CloudAdapter {
    pub fn new(auth: Arc<BotFrameworkAuthentication>) -> Self {
        Self {
            auth,
            sender: Arc::new(AdapterSender),
            send_hooks: Vec::new(),
            update_hooks: Vec::new(),
            delete_hooks: Vec::new(),
        }
    }

    pub fn with_send_hook(mut self, hook: Arc<dyn SendHook>) -> Self {
        self.send_hooks.push(hook);
        self
    }

    pub fn with_update_hook(mut self, hook: Arc<dyn UpdateHook>) -> Self {
        self.update_hooks.push(hook);
        self
    }

    pub fn with_delete_hook(mut self, hook: Arc<dyn DeleteHook>) -> Self {
        self.delete_hooks.push(hook);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Reactive entry point: one inbound request with its authorization
    /// header. Returns the reconciled synchronous payload, if any.
    pub async fn process_activity(
        &self,
        auth_header: &str,
        activity: Activity,
        bot: &dyn BotHandler,
    ) -> Result<Option<InvokeResponse>, AdapterError> {
        let auth_result = self.auth.authenticate_request(&activity, auth_header).await?;
        record_counter(
            "turns_processed",
            1,
            &TelemetryLabels::new()
                .with_channel(activity.channel_id.clone())
                .with_activity_type(format!("{:?}", activity.activity_type)),
        );
        self.run_turn(auth_result, activity, bot).await
    }

    /// Proactive entry point addressed by a stored conversation
    /// reference. Claims are synthesized from the bare app id.
    pub async fn continue_conversation(
        &self,
        app_id: Option<&str>,
        reference: &ConversationReference,
        audience: Option<&str>,
        bot: &dyn BotHandler,
    ) -> Result<(), AdapterError> {
        let continuation = Activity::continuation(reference);
        self.continue_conversation_with_claims(
            create_claims_identity(app_id),
            continuation,
            audience,
            bot,
        )
        .await
    }

    /// Proactive entry point with a caller-supplied identity and
    /// continuation activity.
    pub async fn continue_conversation_with_claims(
        &self,
        claims_identity: ClaimsIdentity,
        continuation_activity: Activity,
        audience: Option<&str>,
        bot: &dyn BotHandler,
    ) -> Result<(), AdapterError> {
        validate_continuation_activity(&continuation_activity)?;
        let audience = audience
            .filter(|audience| !audience.is_empty())
            .unwrap_or_else(|| self.auth.originating_audience())
            .to_string();

        let connector_factory = self.auth.create_connector_factory(&claims_identity);
        let auth_result = AuthenticateRequestResult {
            claims_identity,
            outbound_audience: audience,
            caller_id: None,
            connector_factory,
        };
        self.run_turn(auth_result, continuation_activity, bot).await?;
        Ok(())
    }

    async fn run_turn(
        &self,
        auth_result: AuthenticateRequestResult,
        mut activity: Activity,
        bot: &dyn BotHandler,
    ) -> Result<Option<InvokeResponse>, AdapterError> {
        activity.caller_id = auth_result.caller_id.clone();

        let connector = auth_result
            .connector_factory
            .create(&activity.service_url, &auth_result.outbound_audience)
            .await
            .map_err(AdapterError::Turn)?;
        let user_token_client = self
            .auth
            .create_user_token_client(&auth_result.claims_identity)
            .await?;

        let state = TurnState {
            claims_identity: Some(auth_result.claims_identity),
            connector: Some(connector),
            user_token_client: Some(user_token_client),
            connector_factory: Some(auth_result.connector_factory),
            oauth_scope: Some(auth_result.outbound_audience),
        };
        let context = self.create_turn_context(activity, state);

        debug!(
            channel_id = %context.activity().channel_id,
            activity_type = ?context.activity().activity_type,
            "running turn"
        );
        bot.on_turn(&context).await.map_err(AdapterError::Turn)?;
        Ok(self.process_turn_results(&context))
    }

    /// Builds a turn context wired to this adapter's pipelines.
    pub fn create_turn_context(&self, activity: Activity, state: TurnState) -> TurnContext {
        TurnContext::new(self.sender.clone(), activity)
            .with_state(state)
            .with_send_hooks(self.send_hooks.clone())
            .with_update_hooks(self.update_hooks.clone())
            .with_delete_hooks(self.delete_hooks.clone())
    }

    /// Reconciles the turn's side effects into the synchronous response:
    /// expect-replies turns return the buffered activities, invoke turns
    /// return the stored invoke response (501 when absent), plain
    /// activity turns return nothing.
    pub fn process_turn_results(&self, context: &TurnContext) -> Option<InvokeResponse> {
        if context.activity().delivery_mode() == DeliveryMode::ExpectReplies {
            let replies = ExpectedReplies {
                activities: context.take_buffered_replies(),
            };
            return Some(InvokeResponse::new(200, serde_json::to_value(&replies).ok()));
        }
        if context.activity().is_type(ActivityType::Invoke) {
            return Some(
                context
                    .take_invoke_response()
                    .unwrap_or_else(|| InvokeResponse::new(STATUS_NOT_IMPLEMENTED, None)),
            );
        }
        None
    }
}

/// Synthesizes the claims for a proactive turn from a bare app id.
fn create_claims_identity(app_id: Option<&str>) -> ClaimsIdentity {
    match app_id.filter(|id| !id.is_empty()) {
        Some(app_id) => ClaimsIdentity::new(
            ANONYMOUS_AUTH_TYPE,
            vec![(AUDIENCE_CLAIM, app_id), (APP_ID_CLAIM, app_id)],
        ),
        None => ClaimsIdentity::anonymous(),
    }
}

fn validate_continuation_activity(activity: &Activity) -> Result<(), AdapterError> {
    if activity.conversation.is_none() {
        return Err(AdapterError::InvalidArgument(
            "continuation activity requires a conversation",
        ));
    }
    if activity.service_url.trim().is_empty() {
        return Err(AdapterError::InvalidArgument(
            "continuation activity requires a serviceUrl",
        ));
    }
    Ok(())
}

/// Terminal of the turn-context pipelines; owns the protocol send
/// semantics.
pub struct AdapterSender;

#[async_trait]
impl ActivitySender for AdapterSender {
    /// Activities go out in input order and the response list carries
    /// exactly one entry per input activity.
    async fn send_activities(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        let mut responses = Vec::with_capacity(activities.len());
        for mut activity in activities {
            activity.id = None;
            let mut response: Option<ResourceResponse> = None;

            if activity.is_type(ActivityType::Delay) {
                let millis = activity
                    .value
                    .as_ref()
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_DELAY_MS);
                tokio::time::sleep(Duration::from_millis(millis)).await;
            } else if activity.is_type(ActivityType::InvokeResponse) {
                let stored = activity
                    .value
                    .clone()
                    .and_then(|value| serde_json::from_value::<InvokeResponse>(value).ok())
                    .unwrap_or_else(|| InvokeResponse::new(200, activity.value.clone()));
                context.set_invoke_response(stored);
            } else if activity.is_type(ActivityType::Trace)
                && activity.channel_id != channels::EMULATOR
            {
                // Traces are channel-local diagnostics; drop silently.
            } else if context.activity().delivery_mode() == DeliveryMode::ExpectReplies {
                context.buffer_reply(activity.clone());
            } else if let Some(connector) = &context.turn_state().connector {
                response = if activity.reply_to_id.is_some() {
                    connector.reply_to_activity(&activity).await?
                } else {
                    connector.send_to_conversation(&activity).await?
                };
            }

            responses.push(response.unwrap_or_else(|| {
                ResourceResponse::new(activity.id.clone().unwrap_or_default())
            }));
        }
        Ok(responses)
    }

    async fn update_activity(
        &self,
        context: &TurnContext,
        activity: Activity,
    ) -> Result<Option<ResourceResponse>> {
        match &context.turn_state().connector {
            Some(connector) => connector.update_activity(&activity).await,
            None => {
                warn!("update requested with no connector bound to the turn");
                Ok(None)
            }
        }
    }

    async fn delete_activity(&self, context: &TurnContext, activity_id: &str) -> Result<()> {
        let conversation_id = context
            .activity()
            .conversation
            .as_ref()
            .map(|conversation| conversation.id.clone())
            .unwrap_or_default();
        match &context.turn_state().connector {
            Some(connector) => connector.delete_activity(&conversation_id, activity_id).await,
            None => {
                warn!("delete requested with no connector bound to the turn");
                Ok(())
            }
        }
    }
}
