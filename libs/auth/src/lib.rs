//! Botframe request authentication: token validation against the
//! channel, emulator, government, and skill trust authorities,
//! credential factories for outbound calls, and the orchestrator that
//! turns an authorization header into a per-turn capability set.

pub mod claims;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod keys;
pub mod orchestrator;
pub mod validator;

pub use claims::{
    app_id_from_identity, is_skill_identity, is_skill_token, is_token_from_emulator, parse_bearer,
    peek_payload,
};
pub use credentials::{ClientCredentials, PasswordCredentialFactory};
pub use error::AuthError;
pub use keys::{
    OpenIdKeyResolver, ResolvedKey, SharedKeyResolver, SigningKeyResolver, StaticKeyResolver,
};
pub use orchestrator::{
    AllowedCallersClaimsValidator, AuthConfig, AuthenticateRequestResult,
    BotFrameworkAuthentication, ClaimsValidator, CloudEnvironment,
};
pub use validator::{
    BEARER_AUTH_TYPE, TokenValidationParameters, authenticate_channel_token,
    authenticate_emulator_token, authenticate_skill_token, validate_token,
};
