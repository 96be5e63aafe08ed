use serde::{Deserialize, Serialize};

/// A single name/value assertion extracted from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    #[serde(rename = "type")]
    pub name: String,
    pub value: String,
}

impl Claim {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Authentication type tag marking identities that were never verified.
pub const ANONYMOUS_AUTH_TYPE: &str = "anonymous";

/// Verified assertions from a bearer token plus an authentication-type
/// tag. Immutable once constructed for a request.
///
/// ```
/// use bfm_core::ClaimsIdentity;
///
/// let identity = ClaimsIdentity::new("Bearer", vec![("aud", "app-1")]);
/// assert!(identity.is_authenticated());
/// assert_eq!(identity.claim_value("aud"), Some("app-1"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimsIdentity {
    auth_type: String,
    claims: Vec<Claim>,
}

impl ClaimsIdentity {
    pub fn new<N, V>(auth_type: impl Into<String>, claims: Vec<(N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            auth_type: auth_type.into(),
            claims: claims
                .into_iter()
                .map(|(name, value)| Claim::new(name, value))
                .collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            auth_type: ANONYMOUS_AUTH_TYPE.into(),
            claims: Vec::new(),
        }
    }

    pub fn auth_type(&self) -> &str {
        &self.auth_type
    }

    /// Derived from a non-anonymous authentication type.
    pub fn is_authenticated(&self) -> bool {
        self.auth_type != ANONYMOUS_AUTH_TYPE
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// First claim with the given name, if any.
    pub fn claim_value(&self, name: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.name == name)
            .map(|claim| claim.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_identity_is_not_authenticated() {
        let identity = ClaimsIdentity::anonymous();
        assert!(!identity.is_authenticated());
        assert!(identity.claims().is_empty());
    }

    #[test]
    fn claim_lookup_is_first_match() {
        let identity = ClaimsIdentity::new(
            "Bearer",
            vec![("ver", "1.0"), ("aud", "first"), ("aud", "second")],
        );
        assert_eq!(identity.claim_value("aud"), Some("first"));
        assert_eq!(identity.claim_value("missing"), None);
    }
}
