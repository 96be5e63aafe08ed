use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared outbound credential handle.
pub type SharedTokenProvider = Arc<dyn TokenProvider>;
/// Shared credential factory handle.
pub type SharedCredentialFactory = Arc<dyn CredentialFactory>;

/// Signing credential for outbound calls; an empty token means the
/// request goes out unauthenticated (local emulator traffic).
#[async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    async fn get_token(&self) -> Result<String>;

    /// Application id the credential was issued for, if any.
    fn app_id(&self) -> Option<&str> {
        None
    }
}

/// Produces per-audience credentials from an application identity and
/// answers the registration predicates the token validators depend on.
///
/// A failing `is_valid_app_id` is authoritative: validators short-circuit
/// on it without consulting anything else.
#[async_trait]
pub trait CredentialFactory: Send + Sync {
    async fn is_valid_app_id(&self, app_id: &str) -> Result<bool>;

    async fn is_authentication_disabled(&self) -> Result<bool>;

    async fn create_credentials(
        &self,
        app_id: &str,
        audience: Option<&str>,
        login_endpoint: &str,
        validate_authority: bool,
    ) -> Result<SharedTokenProvider>;
}

/// Credential that always yields an empty token.
#[derive(Debug, Clone, Default)]
pub struct AnonymousTokenProvider;

#[async_trait]
impl TokenProvider for AnonymousTokenProvider {
    async fn get_token(&self) -> Result<String> {
        Ok(String::new())
    }
}
