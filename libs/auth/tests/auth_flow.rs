use bfm_auth::constants::{
    ANONYMOUS_SKILL_APP_ID, CALLER_ID_BOT_PREFIX, CALLER_ID_PUBLIC_AZURE,
    TO_BOT_FROM_CHANNEL_TOKEN_ISSUER, TO_CHANNEL_FROM_BOT_OAUTH_SCOPE, TOKEN_ISSUERS,
};
use bfm_auth::{
    AllowedCallersClaimsValidator, AuthConfig, AuthError, BotFrameworkAuthentication,
    PasswordCredentialFactory, StaticKeyResolver, TokenValidationParameters, validate_token,
};
use bfm_core::{Activity, ChannelAccount, ConversationAccount, channels, role_types};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
use once_cell::sync::Lazy;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;

const KID: &str = "test-key-1";
const BOT_APP_ID: &str = "2cd87869-38a0-4182-9251-d056e8f0ac24";
const CALLER_APP_ID: &str = "ab9a4aba-1111-4a2e-9d3f-2a7c71f44d45";
const SERVICE_URL: &str = "https://smba.example.com/apis";

struct TestKeys {
    encoding: EncodingKey,
    public_pem: String,
}

static TEST_KEYS: Lazy<TestKeys> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate rsa key");
    let public_key = RsaPublicKey::from(&private_key);
    let private_pem = private_key
        .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .expect("encode private")
        .to_string();
    let public_pem = public_key
        .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
        .expect("encode public")
        .to_string();
    TestKeys {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        public_pem,
    }
});

fn decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(TEST_KEYS.public_pem.as_bytes()).expect("decoding key")
}

fn sign_token(mut claims: Value) -> String {
    if claims.get("exp").is_none() {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        claims["exp"] = json!(exp);
    }
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let token = encode(&header, &claims, &TEST_KEYS.encoding).expect("sign token");
    format!("Bearer {token}")
}

fn resolver() -> StaticKeyResolver {
    StaticKeyResolver::new().with_key(KID, decoding_key())
}

fn authentication(factory: Arc<PasswordCredentialFactory>) -> BotFrameworkAuthentication {
    BotFrameworkAuthentication::new(AuthConfig::default(), factory)
        .with_key_resolvers(resolver().shared(), resolver().shared())
}

fn enabled_factory() -> Arc<PasswordCredentialFactory> {
    PasswordCredentialFactory::new(Some(BOT_APP_ID.into()), Some("password".into())).shared()
}

fn inbound_activity() -> Activity {
    let mut activity = Activity::message("hello");
    activity.channel_id = channels::MSTEAMS.into();
    activity.service_url = SERVICE_URL.into();
    activity.conversation = Some(ConversationAccount::new("conv-1"));
    activity.recipient = Some(ChannelAccount::new("bot"));
    activity
}

#[tokio::test]
async fn emulator_token_v1_resolves_app_id_from_appid_claim() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": BOT_APP_ID,
        "ver": "1.0",
    }));

    let result = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .expect("authenticated");
    assert!(result.claims_identity.is_authenticated());
    assert_eq!(result.outbound_audience, TO_CHANNEL_FROM_BOT_OAUTH_SCOPE);
    assert_eq!(result.caller_id.as_deref(), Some(CALLER_ID_PUBLIC_AZURE));
}

#[tokio::test]
async fn emulator_token_v2_resolves_app_id_from_azp_claim() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[1],
        "aud": BOT_APP_ID,
        "azp": BOT_APP_ID,
        "ver": "2.0",
    }));

    let result = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .expect("authenticated");
    assert!(result.claims_identity.is_authenticated());
}

#[tokio::test]
async fn emulator_token_with_unknown_version_fails() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": BOT_APP_ID,
        "azp": BOT_APP_ID,
        "ver": "3.0",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnexpectedVersion(v) if v == "3.0"));
}

#[tokio::test]
async fn emulator_token_for_unregistered_app_fails() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": CALLER_APP_ID,
        "appid": CALLER_APP_ID,
        "ver": "1.0",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnregisteredAppId(_)));
}

#[tokio::test]
async fn skill_token_selects_caller_app_id_as_audience() {
    let auth = authentication(enabled_factory()).with_claims_validator(Arc::new(
        AllowedCallersClaimsValidator::new([CALLER_APP_ID]),
    ));
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": CALLER_APP_ID,
        "ver": "1.0",
    }));

    let result = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .expect("authenticated");
    assert_eq!(result.outbound_audience, CALLER_APP_ID);
    assert_eq!(
        result.caller_id,
        Some(format!("{CALLER_ID_BOT_PREFIX}{CALLER_APP_ID}"))
    );
}

#[tokio::test]
async fn skill_token_without_claims_validator_fails_closed() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": CALLER_APP_ID,
        "ver": "1.0",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingClaimsValidator));
}

#[tokio::test]
async fn skill_token_from_disallowed_caller_fails() {
    let auth = authentication(enabled_factory()).with_claims_validator(Arc::new(
        AllowedCallersClaimsValidator::new(["some-other-app"]),
    ));
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": CALLER_APP_ID,
        "ver": "1.0",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CallerNotAllowed(caller) if caller == CALLER_APP_ID));
}

#[tokio::test]
async fn skill_token_with_unregistered_audience_fails() {
    // Structurally valid and correctly signed, but the aud claim is not
    // a registered application id.
    let auth = authentication(enabled_factory()).with_claims_validator(Arc::new(
        AllowedCallersClaimsValidator::new(["*"]),
    ));
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": "b0000000-0000-0000-0000-000000000bad",
        "appid": CALLER_APP_ID,
        "ver": "1.0",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnregisteredAppId(_)));
}

#[tokio::test]
async fn channel_token_validates_issuer_and_service_url() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
        "aud": BOT_APP_ID,
        "serviceurl": SERVICE_URL,
    }));

    let result = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .expect("authenticated");
    assert!(result.claims_identity.is_authenticated());
    assert_eq!(result.outbound_audience, TO_CHANNEL_FROM_BOT_OAUTH_SCOPE);
}

#[tokio::test]
async fn channel_token_with_mismatched_service_url_fails() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
        "aud": BOT_APP_ID,
        "serviceurl": "https://evil.example.com/apis",
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ServiceUrlMismatch { .. }));
}

#[tokio::test]
async fn channel_token_from_unknown_issuer_fails() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": "https://rogue.example.com",
        "aud": BOT_APP_ID,
        "serviceurl": SERVICE_URL,
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownIssuer(_)));
}

#[tokio::test]
async fn expired_token_fails_lifetime_validation() {
    let auth = authentication(enabled_factory());
    let expired = OffsetDateTime::now_utc().unix_timestamp() - 3600;
    let header = sign_token(json!({
        "iss": TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
        "aud": BOT_APP_ID,
        "serviceurl": SERVICE_URL,
        "exp": expired,
    }));

    let err = auth
        .authenticate_request(&inbound_activity(), &header)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidLifetime));
}

#[tokio::test]
async fn missing_header_with_auth_enabled_fails_closed() {
    let auth = authentication(enabled_factory());
    let err = auth
        .authenticate_request(&inbound_activity(), "")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingAuthHeader));
}

#[tokio::test]
async fn disabled_auth_with_empty_header_yields_anonymous_identity() {
    let factory = PasswordCredentialFactory::new(None, None).shared();
    let auth = authentication(factory);

    let result = auth
        .authenticate_request(&inbound_activity(), "")
        .await
        .expect("anonymous");
    assert!(!result.claims_identity.is_authenticated());
    assert_eq!(result.outbound_audience, TO_CHANNEL_FROM_BOT_OAUTH_SCOPE);
    assert_eq!(result.caller_id, None);
}

#[tokio::test]
async fn disabled_auth_emulator_skill_recipient_yields_anonymous_skill_identity() {
    let factory = PasswordCredentialFactory::new(None, None).shared();
    let auth = authentication(factory).with_claims_validator(Arc::new(
        AllowedCallersClaimsValidator::new(["*"]),
    ));

    let mut activity = inbound_activity();
    activity.channel_id = channels::EMULATOR.into();
    let mut recipient = ChannelAccount::new("skill-bot");
    recipient.role = Some(role_types::SKILL.into());
    activity.recipient = Some(recipient);

    let result = auth
        .authenticate_request(&activity, "")
        .await
        .expect("anonymous skill");
    assert!(!result.claims_identity.is_authenticated());
    assert_eq!(result.outbound_audience, ANONYMOUS_SKILL_APP_ID);
    assert_eq!(result.caller_id, None);
}

#[tokio::test]
async fn streaming_request_requires_channel_id_header() {
    let auth = authentication(enabled_factory());
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": BOT_APP_ID,
        "ver": "1.0",
    }));

    let err = auth
        .authenticate_streaming_request(&header, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingChannelId));

    let result = auth
        .authenticate_streaming_request(&header, channels::EMULATOR)
        .await
        .expect("authenticated");
    assert!(result.claims_identity.is_authenticated());
}

#[tokio::test]
async fn token_without_expiry_is_rejected() {
    let auth = authentication(enabled_factory());
    let claims = json!({
        "iss": TO_BOT_FROM_CHANNEL_TOKEN_ISSUER,
        "aud": BOT_APP_ID,
        "serviceurl": SERVICE_URL,
        "exp": Value::Null,
    });
    // Null exp survives signing but fails required-claim validation.
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let token = encode(&header, &claims, &TEST_KEYS.encoding).expect("sign token");

    let err = auth
        .authenticate_request(&inbound_activity(), &format!("Bearer {token}"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[tokio::test]
async fn missing_endorsements_fail_validation() {
    let resolver = StaticKeyResolver::new().with_endorsed_key(
        KID,
        decoding_key(),
        vec!["msteams".to_string()],
    );
    let header = sign_token(json!({
        "iss": TOKEN_ISSUERS[0],
        "aud": BOT_APP_ID,
        "appid": BOT_APP_ID,
        "ver": "1.0",
    }));

    let mut parameters = TokenValidationParameters::for_token_issuers();
    parameters.required_endorsements = vec!["slack".to_string()];
    let err = validate_token(&header, &resolver, &parameters)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingEndorsement(_)));

    parameters.required_endorsements = vec!["msteams".to_string()];
    let identity = validate_token(&header, &resolver, &parameters)
        .await
        .expect("endorsed");
    assert!(identity.is_authenticated());
}
