use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bfm_adapter::{
    AdapterError, BotHandler, CloudAdapter, FnBotHandler, TranscriptLoggerMiddleware,
};
use bfm_auth::{AuthConfig, BotFrameworkAuthentication, PasswordCredentialFactory, StaticKeyResolver};
use bfm_core::{
    Activity, ActivityType, ChannelAccount, ConnectorClient, ConversationAccount,
    ConversationReference, DeliveryMode, ExpectedReplies, MemoryTranscriptLogger, ResourceResponse,
    TurnContext, TurnState, channels,
};
use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tower::ServiceExt;

const SERVICE_URL: &str = "https://example.com/api";

#[derive(Debug, Clone, PartialEq)]
enum WireCall {
    Send(Option<String>),
    Reply(Option<String>),
}

/// Connector double recording every wire call in order.
struct MockConnector {
    calls: Mutex<Vec<WireCall>>,
    return_none: bool,
}

impl MockConnector {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            return_none: false,
        })
    }

    fn returning_none() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            return_none: true,
        })
    }

    fn calls(&self) -> Vec<WireCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: WireCall) -> Option<ResourceResponse> {
        let mut calls = self.calls.lock().unwrap();
        let id = format!("wire-{}", calls.len());
        calls.push(call);
        if self.return_none {
            None
        } else {
            Some(ResourceResponse::new(id))
        }
    }
}

#[async_trait]
impl ConnectorClient for MockConnector {
    async fn send_to_conversation(&self, activity: &Activity) -> Result<Option<ResourceResponse>> {
        Ok(self.record(WireCall::Send(activity.text.clone())))
    }

    async fn reply_to_activity(&self, activity: &Activity) -> Result<Option<ResourceResponse>> {
        Ok(self.record(WireCall::Reply(activity.text.clone())))
    }

    async fn update_activity(&self, _activity: &Activity) -> Result<Option<ResourceResponse>> {
        Ok(None)
    }

    async fn delete_activity(&self, _conversation_id: &str, _activity_id: &str) -> Result<()> {
        Ok(())
    }

    fn service_url(&self) -> &str {
        SERVICE_URL
    }
}

fn adapter_with_disabled_auth() -> Arc<CloudAdapter> {
    let factory = PasswordCredentialFactory::new(None, None).shared();
    let auth = BotFrameworkAuthentication::new(AuthConfig::default(), factory)
        .with_key_resolvers(
            StaticKeyResolver::new().shared(),
            StaticKeyResolver::new().shared(),
        )
        .shared();
    CloudAdapter::new(auth).shared()
}

fn adapter_with_enabled_auth() -> Arc<CloudAdapter> {
    let factory =
        PasswordCredentialFactory::new(Some("app-1".into()), Some("secret".into())).shared();
    let auth = BotFrameworkAuthentication::new(AuthConfig::default(), factory)
        .with_key_resolvers(
            StaticKeyResolver::new().shared(),
            StaticKeyResolver::new().shared(),
        )
        .shared();
    CloudAdapter::new(auth).shared()
}

fn inbound_activity() -> Activity {
    let mut activity = Activity::message("hello");
    activity.id = Some("inbound-1".into());
    activity.channel_id = channels::MSTEAMS.into();
    activity.service_url = SERVICE_URL.into();
    activity.conversation = Some(ConversationAccount::new("conv-1"));
    activity.from = Some(ChannelAccount::new("user-1"));
    activity.recipient = Some(ChannelAccount::new("bot-1"));
    activity
}

fn mock_context(adapter: &Arc<CloudAdapter>, activity: Activity, connector: Arc<MockConnector>) -> TurnContext {
    adapter.create_turn_context(
        activity,
        TurnState {
            connector: Some(connector),
            ..Default::default()
        },
    )
}

struct NoopBot;

#[async_trait]
impl BotHandler for NoopBot {
    async fn on_turn(&self, _context: &TurnContext) -> Result<()> {
        Ok(())
    }
}

/// Sends a fixed list of activities on every turn.
struct SendingBot {
    activities: Vec<Activity>,
}

#[async_trait]
impl BotHandler for SendingBot {
    async fn on_turn(&self, context: &TurnContext) -> Result<()> {
        context.send_activities(self.activities.clone()).await?;
        Ok(())
    }
}

struct FlagBot {
    called: Arc<AtomicBool>,
}

#[async_trait]
impl BotHandler for FlagBot {
    async fn on_turn(&self, context: &TurnContext) -> Result<()> {
        assert_eq!(context.activity().name.as_deref(), Some("ContinueConversation"));
        self.called.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn invoke_response_activity(status: u16, body: serde_json::Value) -> Activity {
    let mut activity = Activity::new(ActivityType::InvokeResponse);
    activity.value = Some(json!({ "status": status, "body": body }));
    activity
}

#[tokio::test]
async fn send_responses_preserve_input_order() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::new();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let mut reply = Activity::message("a reply");
    reply.reply_to_id = Some("inbound-1".into());
    reply.channel_id = channels::MSTEAMS.into();
    let mut plain = Activity::message("a send");
    plain.channel_id = channels::MSTEAMS.into();
    let mut typing = Activity::new(ActivityType::Typing);
    typing.channel_id = channels::MSTEAMS.into();

    let responses = context
        .send_activities(vec![reply, plain, typing])
        .await
        .unwrap();

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].id, "wire-0");
    assert_eq!(responses[1].id, "wire-1");
    assert_eq!(responses[2].id, "wire-2");
    assert_eq!(
        connector.calls(),
        vec![
            WireCall::Reply(Some("a reply".into())),
            WireCall::Send(Some("a send".into())),
            WireCall::Send(None),
        ]
    );
}

#[tokio::test]
async fn null_connector_response_is_synthesized() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::returning_none();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let mut message = Activity::message("hi");
    message.id = Some("pre-set".into());
    message.channel_id = channels::MSTEAMS.into();
    let responses = context.send_activities(vec![message]).await.unwrap();

    // Ids are cleared before send, so the synthesized response is empty.
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, "");
    assert_eq!(connector.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delay_activity_pauses_without_a_wire_call() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::new();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let mut delay = Activity::new(ActivityType::Delay);
    delay.value = Some(json!(400));
    let mut after = Activity::message("after the pause");
    after.channel_id = channels::MSTEAMS.into();

    let started = tokio::time::Instant::now();
    let responses = context.send_activities(vec![delay, after]).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= std::time::Duration::from_millis(400));
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].id, "");
    assert_eq!(connector.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delay_without_value_defaults_to_one_second() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::new();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let delay = Activity::new(ActivityType::Delay);
    let started = tokio::time::Instant::now();
    context.send_activities(vec![delay]).await.unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_millis(1000));
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn trace_is_dropped_off_the_emulator_channel() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::new();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let mut trace = Activity::trace("diagnostic", Some(json!({"detail": 1})), None);
    trace.channel_id = channels::MSTEAMS.into();
    let responses = context.send_activities(vec![trace]).await.unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, "");
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn trace_is_delivered_on_the_emulator_channel() {
    let adapter = adapter_with_disabled_auth();
    let connector = MockConnector::new();
    let mut inbound = inbound_activity();
    inbound.channel_id = channels::EMULATOR.into();
    let context = mock_context(&adapter, inbound, connector.clone());

    let mut trace = Activity::trace("diagnostic", None, None);
    trace.channel_id = channels::EMULATOR.into();
    let responses = context.send_activities(vec![trace]).await.unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(connector.calls().len(), 1);
}

#[tokio::test]
async fn invoke_without_response_reconciles_to_501() {
    let adapter = adapter_with_disabled_auth();
    let mut invoke = inbound_activity();
    invoke.activity_type = ActivityType::Invoke;

    let result = adapter
        .process_activity("", invoke, &NoopBot)
        .await
        .unwrap();
    let response = result.expect("invoke turns always produce a response");
    assert_eq!(response.status, 501);
    assert_eq!(response.body, None);
}

#[tokio::test]
async fn invoke_with_response_reconciles_to_that_response() {
    let adapter = adapter_with_disabled_auth();
    let mut invoke = inbound_activity();
    invoke.activity_type = ActivityType::Invoke;

    let bot = SendingBot {
        activities: vec![invoke_response_activity(200, json!({"ok": true}))],
    };
    let result = adapter.process_activity("", invoke, &bot).await.unwrap();
    let response = result.expect("invoke turns always produce a response");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({"ok": true})));
}

#[tokio::test]
async fn plain_activity_turns_produce_no_payload() {
    let adapter = adapter_with_disabled_auth();
    let result = adapter
        .process_activity("", inbound_activity(), &NoopBot)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn expect_replies_buffers_instead_of_sending() {
    let adapter = adapter_with_disabled_auth();
    let mut inbound = inbound_activity();
    inbound.delivery_mode = Some(DeliveryMode::ExpectReplies);

    let mut first = Activity::message("first");
    first.channel_id = channels::MSTEAMS.into();
    let mut second = Activity::message("second");
    second.channel_id = channels::MSTEAMS.into();
    let mut dropped_trace = Activity::trace("noise", None, None);
    dropped_trace.channel_id = channels::MSTEAMS.into();

    let bot = SendingBot {
        activities: vec![first, dropped_trace, second],
    };
    let result = adapter.process_activity("", inbound, &bot).await.unwrap();
    let response = result.expect("expect-replies turns produce a response");
    assert_eq!(response.status, 200);

    let replies: ExpectedReplies = serde_json::from_value(response.body.unwrap()).unwrap();
    assert_eq!(replies.activities.len(), 2);
    assert_eq!(replies.activities[0].text.as_deref(), Some("first"));
    assert_eq!(replies.activities[1].text.as_deref(), Some("second"));
}

#[tokio::test]
async fn continuation_without_conversation_fails_before_any_network_call() {
    let adapter = adapter_with_disabled_auth();
    let reference = ConversationReference {
        service_url: SERVICE_URL.into(),
        channel_id: channels::MSTEAMS.into(),
        ..Default::default()
    };
    let called = Arc::new(AtomicBool::new(false));
    let bot = FlagBot {
        called: called.clone(),
    };

    let err = adapter
        .continue_conversation(None, &reference, None, &bot)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidArgument(_)));
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn continuation_without_service_url_fails_before_any_network_call() {
    let adapter = adapter_with_disabled_auth();
    let reference = ConversationReference {
        conversation: Some(ConversationAccount::new("conv-1")),
        channel_id: channels::MSTEAMS.into(),
        ..Default::default()
    };

    let err = adapter
        .continue_conversation(Some("app-1"), &reference, None, &NoopBot)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidArgument(_)));
}

#[tokio::test]
async fn valid_continuation_runs_the_callback() {
    let adapter = adapter_with_disabled_auth();
    let reference = ConversationReference {
        conversation: Some(ConversationAccount::new("conv-1")),
        channel_id: channels::MSTEAMS.into(),
        service_url: SERVICE_URL.into(),
        user: Some(ChannelAccount::new("user-1")),
        bot: Some(ChannelAccount::new("bot-1")),
        ..Default::default()
    };
    let called = Arc::new(AtomicBool::new(false));
    let bot = FlagBot {
        called: called.clone(),
    };

    adapter
        .continue_conversation(Some("app-1"), &reference, None, &bot)
        .await
        .unwrap();
    assert!(called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn transcript_middleware_logs_every_sent_activity() {
    let transcript = Arc::new(MemoryTranscriptLogger::new());
    let factory = PasswordCredentialFactory::new(None, None).shared();
    let auth = BotFrameworkAuthentication::new(AuthConfig::default(), factory).shared();
    let adapter = CloudAdapter::new(auth)
        .with_send_hook(Arc::new(TranscriptLoggerMiddleware::new(transcript.clone())))
        .shared();
    let connector = MockConnector::new();
    let context = mock_context(&adapter, inbound_activity(), connector.clone());

    let mut first = Activity::message("one");
    first.channel_id = channels::MSTEAMS.into();
    let mut second = Activity::message("two");
    second.channel_id = channels::MSTEAMS.into();
    context.send_activities(vec![first, second]).await.unwrap();

    let logged = transcript.activities();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].text.as_deref(), Some("one"));
    assert_eq!(logged[1].text.as_deref(), Some("two"));
    assert_eq!(connector.calls().len(), 2);
}

fn echo_turn(context: &TurnContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        context.reply_text("echo").await?;
        Ok(())
    })
}

#[tokio::test]
async fn fn_bot_handler_adapts_plain_functions() {
    let adapter = adapter_with_disabled_auth();
    let mut inbound = inbound_activity();
    inbound.delivery_mode = Some(DeliveryMode::ExpectReplies);

    let bot = FnBotHandler::new(echo_turn);
    let result = adapter.process_activity("", inbound, &bot).await.unwrap();
    let response = result.expect("expect-replies turns produce a response");
    let replies: ExpectedReplies = serde_json::from_value(response.body.unwrap()).unwrap();
    assert_eq!(replies.activities.len(), 1);
    assert_eq!(replies.activities[0].text.as_deref(), Some("echo"));
}

#[tokio::test]
async fn http_route_rejects_missing_auth_when_enabled() {
    let app = bfm_adapter::http::router(adapter_with_enabled_auth(), Arc::new(NoopBot));
    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&inbound_activity()).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_route_accepts_plain_turns_with_202() {
    let app = bfm_adapter::http::router(adapter_with_disabled_auth(), Arc::new(NoopBot));
    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&inbound_activity()).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn http_route_maps_unanswered_invokes_to_501() {
    let app = bfm_adapter::http::router(adapter_with_disabled_auth(), Arc::new(NoopBot));
    let mut invoke = inbound_activity();
    invoke.activity_type = ActivityType::Invoke;
    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&invoke).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}
