//! Outbound HTTP clients for the Botframe conversational runtime: the
//! v3 conversations connector, the user-token service client, and the
//! parameterized connector factory.

mod client;
mod factory;
mod user_token;

pub use client::HttpConnectorClient;
pub use factory::ParameterizedConnectorFactory;
pub use user_token::RestUserTokenClient;
