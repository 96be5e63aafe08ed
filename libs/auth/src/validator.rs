use crate::claims::{app_id_from_identity, parse_bearer, peek_payload};
use crate::constants::{
    AUDIENCE_CLAIM, DEFAULT_CLOCK_SKEW_SECONDS, ISSUER_CLAIM, SERVICE_URL_CLAIM, TOKEN_ISSUERS,
    VERSION_CLAIM,
};
use crate::error::AuthError;
use crate::keys::SigningKeyResolver;
use bfm_core::{ClaimsIdentity, CredentialFactory};
use jsonwebtoken::{Validation, decode, decode_header, errors::ErrorKind};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Authentication type tag attached to verified bearer identities.
pub const BEARER_AUTH_TYPE: &str = "Bearer";

/// Issuer/lifetime/signature policy applied to one trust source.
/// Audience is always checked manually by the strategy, because the
/// registered-app-id predicate is asynchronous and authoritative.
#[derive(Debug, Clone)]
pub struct TokenValidationParameters {
    pub valid_issuers: Vec<String>,
    pub clock_skew_seconds: u64,
    pub required_endorsements: Vec<String>,
}

impl TokenValidationParameters {
    pub fn for_issuers<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_issuers: issuers.into_iter().map(Into::into).collect(),
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            required_endorsements: Vec::new(),
        }
    }

    /// Policy for emulator- and skill-issued tokens (tenant allow-list).
    pub fn for_token_issuers() -> Self {
        Self::for_issuers(TOKEN_ISSUERS.iter().copied())
    }
}

fn flatten_claim(name: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => out.push((name.to_string(), s.clone())),
        Value::Array(items) => {
            for item in items {
                flatten_claim(name, item, out);
            }
        }
        Value::Null => {}
        other => out.push((name.to_string(), other.to_string())),
    }
}

/// Verifies signature, issuer, and lifetime of a bearer token and
/// extracts its claims. Audience checks are left to the caller.
pub async fn validate_token(
    auth_header: &str,
    resolver: &dyn SigningKeyResolver,
    parameters: &TokenValidationParameters,
) -> Result<ClaimsIdentity, AuthError> {
    let token = parse_bearer(auth_header)?;
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    let resolved = resolver.resolve(header.kid.as_deref()).await?;

    for endorsement in &parameters.required_endorsements {
        if !resolved.endorsements.contains(endorsement) {
            return Err(AuthError::MissingEndorsement(endorsement.clone()));
        }
    }

    let mut validation = Validation::new(header.alg);
    validation.leeway = parameters.clock_skew_seconds;
    validation.validate_aud = false;
    validation.set_issuer(&parameters.valid_issuers);

    let data =
        decode::<BTreeMap<String, Value>>(token, &resolved.key, &validation).map_err(|err| {
            if matches!(err.kind(), ErrorKind::InvalidIssuer) {
                let issuer = peek_payload(auth_header)
                    .ok()
                    .and_then(|payload| {
                        payload
                            .get(ISSUER_CLAIM)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                AuthError::UnknownIssuer(issuer)
            } else if matches!(
                err.kind(),
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature
            ) {
                AuthError::InvalidLifetime
            } else {
                AuthError::InvalidToken(err)
            }
        })?;

    let mut claims = Vec::with_capacity(data.claims.len());
    for (name, value) in &data.claims {
        flatten_claim(name, value, &mut claims);
    }
    Ok(ClaimsIdentity::new(BEARER_AUTH_TYPE, claims))
}

async fn require_registered_audience(
    identity: &ClaimsIdentity,
    credentials: &dyn CredentialFactory,
) -> Result<String, AuthError> {
    let audience = identity
        .claim_value(AUDIENCE_CLAIM)
        .filter(|aud| !aud.trim().is_empty())
        .ok_or(AuthError::MissingClaim(AUDIENCE_CLAIM))?
        .to_string();
    let valid = credentials
        .is_valid_app_id(&audience)
        .await
        .map_err(AuthError::Credentials)?;
    if !valid {
        return Err(AuthError::UnregisteredAppId(audience));
    }
    Ok(audience)
}

/// Validates a channel-issued token (public or government cloud,
/// depending on the issuer passed in).
///
/// When the caller context supplies a service URL, the token's
/// `serviceurl` claim must equal it case-sensitively.
pub async fn authenticate_channel_token(
    auth_header: &str,
    credentials: &dyn CredentialFactory,
    resolver: &dyn SigningKeyResolver,
    issuer: &str,
    service_url: Option<&str>,
) -> Result<ClaimsIdentity, AuthError> {
    let parameters = TokenValidationParameters::for_issuers([issuer]);
    let identity = validate_token(auth_header, resolver, &parameters).await?;

    require_registered_audience(&identity, credentials).await?;

    if let Some(expected) = service_url {
        let claim = identity
            .claim_value(SERVICE_URL_CLAIM)
            .ok_or(AuthError::MissingClaim(SERVICE_URL_CLAIM))?;
        if claim != expected {
            return Err(AuthError::ServiceUrlMismatch {
                claim: claim.to_string(),
                expected: expected.to_string(),
            });
        }
    }

    debug!(issuer, "channel token validated");
    Ok(identity)
}

/// Validates an emulator-issued token and confirms the calling
/// application is registered. The app id comes from `appid` (1.0 shape)
/// or `azp` (2.0 shape); any other version fails hard.
pub async fn authenticate_emulator_token(
    auth_header: &str,
    credentials: &dyn CredentialFactory,
    resolver: &dyn SigningKeyResolver,
) -> Result<ClaimsIdentity, AuthError> {
    let parameters = TokenValidationParameters::for_token_issuers();
    let identity = validate_token(auth_header, resolver, &parameters).await?;

    let app_id = app_id_from_identity(&identity)?;
    let valid = credentials
        .is_valid_app_id(&app_id)
        .await
        .map_err(AuthError::Credentials)?;
    if !valid {
        return Err(AuthError::UnregisteredAppId(app_id));
    }

    debug!(app_id, "emulator token validated");
    Ok(identity)
}

/// Validates a skill-to-skill token: tenant allow-list issuer, required
/// `ver` claim, and an audience registered with the credential factory.
pub async fn authenticate_skill_token(
    auth_header: &str,
    credentials: &dyn CredentialFactory,
    resolver: &dyn SigningKeyResolver,
) -> Result<ClaimsIdentity, AuthError> {
    let parameters = TokenValidationParameters::for_token_issuers();
    let identity = validate_token(auth_header, resolver, &parameters).await?;

    if identity.claim_value(VERSION_CLAIM).is_none() {
        return Err(AuthError::MissingClaim(VERSION_CLAIM));
    }
    let audience = require_registered_audience(&identity, credentials).await?;

    debug!(audience, "skill token validated");
    Ok(identity)
}
