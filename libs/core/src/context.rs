use crate::activity::{Activity, InvokeResponse, ResourceResponse};
use crate::connector::{SharedConnectorClient, SharedConnectorFactory, SharedUserTokenClient};
use crate::identity::ClaimsIdentity;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Typed per-turn service slots. Every slot may be absent; middleware and
/// dialogs read what the adapter seeded at turn start.
#[derive(Clone, Default)]
pub struct TurnState {
    pub claims_identity: Option<ClaimsIdentity>,
    pub connector: Option<SharedConnectorClient>,
    pub user_token_client: Option<SharedUserTokenClient>,
    pub connector_factory: Option<SharedConnectorFactory>,
    pub oauth_scope: Option<String>,
}

/// Terminal of the per-turn side-effect pipelines, implemented by the
/// adapter driving the turn.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send_activities(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>>;

    async fn update_activity(
        &self,
        context: &TurnContext,
        activity: Activity,
    ) -> Result<Option<ResourceResponse>>;

    async fn delete_activity(&self, context: &TurnContext, activity_id: &str) -> Result<()>;
}

/// Remaining send pipeline; a hook forwards (possibly rewritten)
/// activities by awaiting `next.run(..)`.
pub struct SendNext<'a> {
    context: &'a TurnContext,
    hooks: &'a [Arc<dyn SendHook>],
    sender: &'a dyn ActivitySender,
}

impl<'a> SendNext<'a> {
    pub fn run(self, activities: Vec<Activity>) -> BoxFuture<'a, Result<Vec<ResourceResponse>>> {
        Box::pin(async move {
            match self.hooks.split_first() {
                Some((hook, rest)) => {
                    hook.on_send(
                        self.context,
                        activities,
                        SendNext {
                            context: self.context,
                            hooks: rest,
                            sender: self.sender,
                        },
                    )
                    .await
                }
                None => self.sender.send_activities(self.context, activities).await,
            }
        })
    }
}

pub struct UpdateNext<'a> {
    context: &'a TurnContext,
    hooks: &'a [Arc<dyn UpdateHook>],
    sender: &'a dyn ActivitySender,
}

impl<'a> UpdateNext<'a> {
    pub fn run(self, activity: Activity) -> BoxFuture<'a, Result<Option<ResourceResponse>>> {
        Box::pin(async move {
            match self.hooks.split_first() {
                Some((hook, rest)) => {
                    hook.on_update(
                        self.context,
                        activity,
                        UpdateNext {
                            context: self.context,
                            hooks: rest,
                            sender: self.sender,
                        },
                    )
                    .await
                }
                None => self.sender.update_activity(self.context, activity).await,
            }
        })
    }
}

pub struct DeleteNext<'a> {
    context: &'a TurnContext,
    hooks: &'a [Arc<dyn DeleteHook>],
    sender: &'a dyn ActivitySender,
}

impl<'a> DeleteNext<'a> {
    pub fn run(self, activity_id: String) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.hooks.split_first() {
                Some((hook, rest)) => {
                    hook.on_delete(
                        self.context,
                        activity_id,
                        DeleteNext {
                            context: self.context,
                            hooks: rest,
                            sender: self.sender,
                        },
                    )
                    .await
                }
                None => self.sender.delete_activity(self.context, &activity_id).await,
            }
        })
    }
}

/// Interceptor wrapping the outbound send pipeline.
#[async_trait]
pub trait SendHook: Send + Sync {
    async fn on_send(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
        next: SendNext<'_>,
    ) -> Result<Vec<ResourceResponse>>;
}

/// Interceptor wrapping activity updates.
#[async_trait]
pub trait UpdateHook: Send + Sync {
    async fn on_update(
        &self,
        context: &TurnContext,
        activity: Activity,
        next: UpdateNext<'_>,
    ) -> Result<Option<ResourceResponse>>;
}

/// Interceptor wrapping activity deletes.
#[async_trait]
pub trait DeleteHook: Send + Sync {
    async fn on_delete(
        &self,
        context: &TurnContext,
        activity_id: String,
        next: DeleteNext<'_>,
    ) -> Result<()>;
}

/// Per-request execution context: the inbound activity, typed turn
/// state, and the three side-effect pipelines. Created at turn start,
/// discarded at turn end, never persisted or shared across turns.
pub struct TurnContext {
    activity: Activity,
    state: TurnState,
    sender: Arc<dyn ActivitySender>,
    send_hooks: Vec<Arc<dyn SendHook>>,
    update_hooks: Vec<Arc<dyn UpdateHook>>,
    delete_hooks: Vec<Arc<dyn DeleteHook>>,
    buffered_replies: Mutex<Vec<Activity>>,
    invoke_response: Mutex<Option<InvokeResponse>>,
    responded: AtomicBool,
}

impl TurnContext {
    pub fn new(sender: Arc<dyn ActivitySender>, activity: Activity) -> Self {
        Self {
            activity,
            state: TurnState::default(),
            sender,
            send_hooks: Vec::new(),
            update_hooks: Vec::new(),
            delete_hooks: Vec::new(),
            buffered_replies: Mutex::new(Vec::new()),
            invoke_response: Mutex::new(None),
            responded: AtomicBool::new(false),
        }
    }

    pub fn with_state(mut self, state: TurnState) -> Self {
        self.state = state;
        self
    }

    pub fn with_send_hooks(mut self, hooks: Vec<Arc<dyn SendHook>>) -> Self {
        self.send_hooks = hooks;
        self
    }

    pub fn with_update_hooks(mut self, hooks: Vec<Arc<dyn UpdateHook>>) -> Self {
        self.update_hooks = hooks;
        self
    }

    pub fn with_delete_hooks(mut self, hooks: Vec<Arc<dyn DeleteHook>>) -> Self {
        self.delete_hooks = hooks;
        self
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.state
    }

    /// True once any activity has been pushed through the send pipeline.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    /// Sends one activity; returns the first response, if any.
    pub async fn send_activity(&self, activity: Activity) -> Result<Option<ResourceResponse>> {
        let mut responses = self.send_activities(vec![activity]).await?;
        Ok(if responses.is_empty() {
            None
        } else {
            Some(responses.remove(0))
        })
    }

    /// Replies to the inbound activity with plain text.
    pub async fn reply_text(&self, text: &str) -> Result<Option<ResourceResponse>> {
        self.send_activity(self.activity.create_reply(Some(text))).await
    }

    /// Runs the send pipeline. The response list preserves input order
    /// and carries exactly one entry per input activity.
    pub async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        if activities.is_empty() {
            return Ok(Vec::new());
        }
        self.responded.store(true, Ordering::SeqCst);
        SendNext {
            context: self,
            hooks: &self.send_hooks,
            sender: self.sender.as_ref(),
        }
        .run(activities)
        .await
    }

    pub async fn update_activity(&self, activity: Activity) -> Result<Option<ResourceResponse>> {
        UpdateNext {
            context: self,
            hooks: &self.update_hooks,
            sender: self.sender.as_ref(),
        }
        .run(activity)
        .await
    }

    pub async fn delete_activity(&self, activity_id: &str) -> Result<()> {
        DeleteNext {
            context: self,
            hooks: &self.delete_hooks,
            sender: self.sender.as_ref(),
        }
        .run(activity_id.to_string())
        .await
    }

    /// Records an activity instead of transmitting it (expect-replies
    /// delivery mode).
    pub fn buffer_reply(&self, activity: Activity) {
        self.buffered_replies
            .lock()
            .expect("buffered replies lock poisoned")
            .push(activity);
    }

    /// Drains the expect-replies buffer in send order.
    pub fn take_buffered_replies(&self) -> Vec<Activity> {
        std::mem::take(
            &mut *self
                .buffered_replies
                .lock()
                .expect("buffered replies lock poisoned"),
        )
    }

    pub fn set_invoke_response(&self, response: InvokeResponse) {
        *self
            .invoke_response
            .lock()
            .expect("invoke response lock poisoned") = Some(response);
    }

    pub fn take_invoke_response(&self) -> Option<InvokeResponse> {
        self.invoke_response
            .lock()
            .expect("invoke response lock poisoned")
            .take()
    }
}
