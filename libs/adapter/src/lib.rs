//! Botframe turn driver: authenticates inbound requests, binds the
//! outbound connector and user-token clients into a turn context, runs
//! the bot callback, and reconciles the turn's side effects into a
//! protocol-correct response.

mod bot;
mod cloud_adapter;
mod error;
pub mod http;
mod transcript;

pub use bot::{BotHandler, FnBotHandler};
pub use cloud_adapter::{AdapterSender, CloudAdapter};
pub use error::AdapterError;
pub use transcript::TranscriptLoggerMiddleware;
