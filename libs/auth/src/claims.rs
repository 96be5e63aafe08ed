use crate::constants::{
    ANONYMOUS_SKILL_APP_ID, APP_ID_CLAIM, AUDIENCE_CLAIM, AUTHORIZED_PARTY_CLAIM, ISSUER_CLAIM,
    TO_BOT_FROM_CHANNEL_TOKEN_ISSUER, TOKEN_ISSUERS, VERSION_CLAIM,
};
use crate::error::AuthError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bfm_core::ClaimsIdentity;
use serde_json::Value;
use std::collections::BTreeMap;

/// Strips the `Bearer` scheme off an authorization header.
pub fn parse_bearer(auth_header: &str) -> Result<&str, AuthError> {
    let mut parts = auth_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Decodes a JWT payload without verifying the signature. Used only to
/// pick a validation strategy; nothing here is trusted.
pub fn peek_payload(auth_header: &str) -> Result<BTreeMap<String, Value>, AuthError> {
    let token = parse_bearer(auth_header)?;
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::MalformedToken),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

fn payload_str<'a>(payload: &'a BTreeMap<String, Value>, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(Value::as_str)
}

/// Resolves the calling application id from version-dependent claims:
/// `appid` for 1.0-shape tokens (or when `ver` is absent), `azp` for
/// 2.0-shape tokens. Any other version is a hard failure.
pub fn app_id_from_parts(
    version: Option<&str>,
    app_id: Option<&str>,
    authorized_party: Option<&str>,
) -> Result<String, AuthError> {
    match version {
        None | Some("") | Some("1.0") => app_id
            .map(str::to_string)
            .ok_or(AuthError::MissingClaim(APP_ID_CLAIM)),
        Some("2.0") => authorized_party
            .map(str::to_string)
            .ok_or(AuthError::MissingClaim(AUTHORIZED_PARTY_CLAIM)),
        Some(other) => Err(AuthError::UnexpectedVersion(other.to_string())),
    }
}

/// Resolves the calling application id from a validated identity.
pub fn app_id_from_identity(identity: &ClaimsIdentity) -> Result<String, AuthError> {
    app_id_from_parts(
        identity.claim_value(VERSION_CLAIM),
        identity.claim_value(APP_ID_CLAIM),
        identity.claim_value(AUTHORIZED_PARTY_CLAIM),
    )
}

/// True when the identity carries the claim shape of a skill-to-skill
/// call: a version claim, an audience that is not the channel issuer,
/// and a calling app id distinct from that audience. Anonymous skill
/// identities (auth disabled) are also skill claims.
pub fn is_skill_identity(identity: &ClaimsIdentity) -> bool {
    if identity.claim_value(APP_ID_CLAIM) == Some(ANONYMOUS_SKILL_APP_ID) {
        return true;
    }
    if identity.claim_value(VERSION_CLAIM).is_none() {
        return false;
    }
    let audience = match identity.claim_value(AUDIENCE_CLAIM) {
        Some(aud) if !aud.is_empty() && aud != TO_BOT_FROM_CHANNEL_TOKEN_ISSUER => aud,
        _ => return false,
    };
    match app_id_from_identity(identity) {
        Ok(app_id) => app_id != audience,
        Err(_) => false,
    }
}

/// Structural check on an unverified token: does the payload look like a
/// skill-issued token?
pub fn is_skill_token(auth_header: &str) -> bool {
    let payload = match peek_payload(auth_header) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    let version = payload_str(&payload, VERSION_CLAIM);
    let audience = match payload_str(&payload, AUDIENCE_CLAIM) {
        Some(aud) if !aud.is_empty() && aud != TO_BOT_FROM_CHANNEL_TOKEN_ISSUER => aud,
        _ => return false,
    };
    if version.is_none() {
        return false;
    }
    match app_id_from_parts(
        version,
        payload_str(&payload, APP_ID_CLAIM),
        payload_str(&payload, AUTHORIZED_PARTY_CLAIM),
    ) {
        Ok(app_id) => app_id != audience,
        Err(_) => false,
    }
}

/// Structural check on an unverified token: was it minted by one of the
/// well-known emulator issuers?
pub fn is_token_from_emulator(auth_header: &str) -> bool {
    match peek_payload(auth_header) {
        Ok(payload) => payload_str(&payload, ISSUER_CLAIM)
            .map(|iss| TOKEN_ISSUERS.contains(&iss))
            .unwrap_or(false),
        Err(_) => false,
    }
}
