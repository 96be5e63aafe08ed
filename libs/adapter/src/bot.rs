use anyhow::Result;
use async_trait::async_trait;
use bfm_core::TurnContext;
use futures::future::BoxFuture;

/// The bot's turn logic, invoked once per inbound activity with the
/// fully seeded turn context.
#[async_trait]
pub trait BotHandler: Send + Sync {
    async fn on_turn(&self, context: &TurnContext) -> Result<()>;
}

/// Adapts a closure into a [`BotHandler`].
pub struct FnBotHandler<F>(F);

impl<F> FnBotHandler<F>
where
    F: for<'a> Fn(&'a TurnContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

#[async_trait]
impl<F> BotHandler for FnBotHandler<F>
where
    F: for<'a> Fn(&'a TurnContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn on_turn(&self, context: &TurnContext) -> Result<()> {
        (self.0)(context).await
    }
}
