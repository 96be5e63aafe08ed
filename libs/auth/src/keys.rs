use crate::error::AuthError;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::Jwk;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;

/// Shared key resolver handle.
pub type SharedKeyResolver = Arc<dyn SigningKeyResolver>;

/// A verification key plus the endorsements published alongside it.
#[derive(Clone)]
pub struct ResolvedKey {
    pub key: DecodingKey,
    pub endorsements: Vec<String>,
}

impl ResolvedKey {
    pub fn new(key: DecodingKey) -> Self {
        Self {
            key,
            endorsements: Vec::new(),
        }
    }
}

/// Source of token-signature verification keys, normally backed by an
/// OpenID metadata document.
#[async_trait]
pub trait SigningKeyResolver: Send + Sync {
    async fn resolve(&self, kid: Option<&str>) -> Result<ResolvedKey, AuthError>;
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct RawKeySet {
    #[serde(default)]
    keys: Vec<Value>,
}

struct CachedKeys {
    fetched_at: OffsetDateTime,
    keys: Vec<Value>,
}

/// Resolves signing keys through an OpenID metadata endpoint, caching
/// the downloaded key set and refreshing it when a kid is unknown or
/// the cache has aged out.
pub struct OpenIdKeyResolver {
    http: reqwest::Client,
    metadata_url: String,
    cache: RwLock<Option<CachedKeys>>,
}

const KEY_CACHE_LIFETIME: Duration = Duration::hours(1);

impl OpenIdKeyResolver {
    pub fn new(http: reqwest::Client, metadata_url: impl Into<String>) -> Self {
        Self {
            http,
            metadata_url: metadata_url.into(),
            cache: RwLock::new(None),
        }
    }

    async fn fetch_keys(&self) -> Result<Vec<Value>, AuthError> {
        let config: OpenIdConfiguration = self
            .http
            .get(&self.metadata_url)
            .send()
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?
            .json()
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?;

        debug!(jwks_uri = %config.jwks_uri, "refreshing signing keys");

        let key_set: RawKeySet = self
            .http
            .get(&config.jwks_uri)
            .send()
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?
            .json()
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?;

        Ok(key_set.keys)
    }

    fn find_key(keys: &[Value], kid: Option<&str>) -> Option<ResolvedKey> {
        let raw = match kid {
            Some(kid) => keys
                .iter()
                .find(|key| key.get("kid").and_then(Value::as_str) == Some(kid)),
            // Without a kid the set must be unambiguous.
            None if keys.len() == 1 => keys.first(),
            None => None,
        }?;
        let jwk: Jwk = serde_json::from_value(raw.clone()).ok()?;
        let key = DecodingKey::from_jwk(&jwk).ok()?;
        let endorsements = raw
            .get("endorsements")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(ResolvedKey { key, endorsements })
    }
}

#[async_trait]
impl SigningKeyResolver for OpenIdKeyResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<ResolvedKey, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let fresh = OffsetDateTime::now_utc() - cached.fetched_at < KEY_CACHE_LIFETIME;
                if fresh {
                    if let Some(found) = Self::find_key(&cached.keys, kid) {
                        return Ok(found);
                    }
                }
            }
        }

        let keys = self.fetch_keys().await?;
        let found = Self::find_key(&keys, kid);
        *self.cache.write().await = Some(CachedKeys {
            fetched_at: OffsetDateTime::now_utc(),
            keys,
        });
        found.ok_or_else(|| AuthError::UnknownSigningKey(kid.unwrap_or("<none>").to_string()))
    }
}

/// Fixed kid-to-key map used in tests and self-hosted setups.
#[derive(Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, ResolvedKey>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), ResolvedKey::new(key));
        self
    }

    pub fn with_endorsed_key(
        mut self,
        kid: impl Into<String>,
        key: DecodingKey,
        endorsements: Vec<String>,
    ) -> Self {
        self.keys.insert(kid.into(), ResolvedKey { key, endorsements });
        self
    }

    pub fn shared(self) -> SharedKeyResolver {
        Arc::new(self)
    }
}

#[async_trait]
impl SigningKeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<ResolvedKey, AuthError> {
        match kid {
            Some(kid) => self
                .keys
                .get(kid)
                .cloned()
                .ok_or_else(|| AuthError::UnknownSigningKey(kid.to_string())),
            // Without a kid the configured set must be unambiguous.
            None => {
                let mut values = self.keys.values();
                match (values.next(), values.next()) {
                    (Some(key), None) => Ok(key.clone()),
                    _ => Err(AuthError::UnknownSigningKey("<none>".to_string())),
                }
            }
        }
    }
}
