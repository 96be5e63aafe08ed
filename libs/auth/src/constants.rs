//! Well-known protocol constants: claim names, issuer tables, metadata
//! and login endpoints for the public and US Government clouds.

/// OAuth scope used for bot-to-channel traffic in the public cloud.
pub const TO_CHANNEL_FROM_BOT_OAUTH_SCOPE: &str = "https://api.botframework.com";
/// Login authority for client-credential grants in the public cloud.
pub const TO_CHANNEL_FROM_BOT_LOGIN_URL: &str =
    "https://login.microsoftonline.com/botframework.com";
/// Issuer stamped on channel-issued tokens.
pub const TO_BOT_FROM_CHANNEL_TOKEN_ISSUER: &str = "https://api.botframework.com";
/// OpenID metadata endpoint for channel-issued tokens.
pub const TO_BOT_FROM_CHANNEL_OPENID_METADATA_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";
/// OpenID metadata endpoint for emulator- and skill-issued tokens.
pub const TO_BOT_FROM_EMULATOR_OPENID_METADATA_URL: &str =
    "https://login.microsoftonline.com/common/v2.0/.well-known/openid-configuration";
/// Base URL of the user-token service.
pub const OAUTH_URL: &str = "https://api.botframework.com";

/// US Government cloud counterparts.
pub mod government {
    pub const CHANNEL_SERVICE: &str = "https://botframework.azure.us";
    pub const TO_CHANNEL_FROM_BOT_OAUTH_SCOPE: &str = "https://api.botframework.us";
    pub const TO_CHANNEL_FROM_BOT_LOGIN_URL: &str =
        "https://login.microsoftonline.us/MicrosoftServices.onmicrosoft.us";
    pub const TO_BOT_FROM_CHANNEL_TOKEN_ISSUER: &str = "https://api.botframework.us";
    pub const TO_BOT_FROM_CHANNEL_OPENID_METADATA_URL: &str =
        "https://login.botframework.azure.us/v1/.well-known/openidconfiguration";
    pub const TO_BOT_FROM_EMULATOR_OPENID_METADATA_URL: &str =
        "https://login.microsoftonline.us/cab8a31a-1906-4287-a0d8-4eef66b95f6e/v2.0/.well-known/openid-configuration";
    pub const OAUTH_URL: &str = "https://api.botframework.azure.us";
}

/// Tenant issuers accepted for emulator- and skill-issued tokens, in
/// both 1.0 and 2.0 token shapes, public and government clouds.
pub const TOKEN_ISSUERS: &[&str] = &[
    "https://sts.windows.net/d6d49420-f39b-4df7-a1dc-d59a935871db/",
    "https://login.microsoftonline.com/d6d49420-f39b-4df7-a1dc-d59a935871db/v2.0",
    "https://sts.windows.net/f8cdef31-a31e-4b4a-93e4-5f571e91255a/",
    "https://login.microsoftonline.com/f8cdef31-a31e-4b4a-93e4-5f571e91255a/v2.0",
    "https://sts.windows.net/cab8a31a-1906-4287-a0d8-4eef66b95f6e/",
    "https://login.microsoftonline.us/cab8a31a-1906-4287-a0d8-4eef66b95f6e/v2.0",
    "https://login.microsoftonline.us/f8cdef31-a31e-4b4a-93e4-5f571e91255a/",
    "https://login.microsoftonline.us/f8cdef31-a31e-4b4a-93e4-5f571e91255a/v2.0",
];

pub const AUDIENCE_CLAIM: &str = "aud";
pub const ISSUER_CLAIM: &str = "iss";
pub const APP_ID_CLAIM: &str = "appid";
pub const AUTHORIZED_PARTY_CLAIM: &str = "azp";
pub const VERSION_CLAIM: &str = "ver";
pub const SERVICE_URL_CLAIM: &str = "serviceurl";
pub const TENANT_ID_CLAIM: &str = "tid";

/// Caller-id stamped on activities arriving from public-cloud channels.
pub const CALLER_ID_PUBLIC_AZURE: &str = "urn:botframework:azure";
/// Caller-id stamped on activities arriving from government channels.
pub const CALLER_ID_US_GOV: &str = "urn:botframework:azureusgov";
/// Prefix for bot-to-bot caller ids; the calling app id is appended.
pub const CALLER_ID_BOT_PREFIX: &str = "urn:botframework:aad:appid:";

/// App id carried by anonymous skill identities when auth is disabled.
pub const ANONYMOUS_SKILL_APP_ID: &str = "AnonymousSkillAppId";

/// Allowed clock drift when validating token lifetimes.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 300;
