use thiserror::Error;

/// Fatal authentication failures. These propagate out of the turn
/// driver uncaught; callers surface them as an unauthorized response
/// and never retry.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header is missing and authentication is enabled")]
    MissingAuthHeader,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token is not structurally valid")]
    MalformedToken,

    #[error("token validation failed: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token issuer '{0}' is not trusted")]
    UnknownIssuer(String),

    #[error("token is expired or not yet valid")]
    InvalidLifetime,

    #[error("token is missing required claim '{0}'")]
    MissingClaim(&'static str),

    #[error("unexpected token version '{0}'")]
    UnexpectedVersion(String),

    #[error("app id '{0}' is not a registered application")]
    UnregisteredAppId(String),

    #[error("token serviceurl claim '{claim}' does not match request service URL '{expected}'")]
    ServiceUrlMismatch { claim: String, expected: String },

    #[error("signing key '{0}' could not be resolved")]
    UnknownSigningKey(String),

    #[error("signing key metadata could not be retrieved: {0}")]
    KeyRetrieval(String),

    #[error("signing key is missing required endorsement '{0}'")]
    MissingEndorsement(String),

    #[error("skill claims require a configured claims validator")]
    MissingClaimsValidator,

    #[error("caller '{0}' is not an allowed caller")]
    CallerNotAllowed(String),

    #[error("channel id header is required for streaming requests")]
    MissingChannelId,

    #[error("credential factory failure: {0}")]
    Credentials(#[source] anyhow::Error),
}
