//! Queue tokens
//!
//! A token proves that a caller knows the `(queue, user_id)` pair it claims.
//! It is the lowercase hex SHA-256 digest of `"<namespace>-<queue>-<user_id>"`.
//! Tokens are deterministic and unkeyed, so they carry no secret and never
//! expire; anyone who knows the inputs can compute them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Namespace prefix used unless configured otherwise
pub const DEFAULT_TOKEN_NAMESPACE: &str = "user-queue";

/// Token errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Hash algorithm unavailable: {0}")]
    HashAlgorithmUnavailable(String),
}

/// Digest used to derive tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    fn digest(&self, input: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(input).to_vec(),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(TokenError::HashAlgorithmUnavailable(s.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Hex-encoded queue token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueToken(String);

impl QueueToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for QueueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives and checks queue tokens
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    namespace: String,
    algorithm: DigestAlgorithm,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self { namespace: DEFAULT_TOKEN_NAMESPACE.to_string(), algorithm: DigestAlgorithm::Sha256 }
    }
}

impl TokenIssuer {
    /// Create an issuer, resolving the algorithm name up front.
    ///
    /// # Errors
    /// Returns `TokenError::HashAlgorithmUnavailable` for anything but `sha256`.
    pub fn new(namespace: impl Into<String>, algorithm: &str) -> Result<Self, TokenError> {
        Ok(Self { namespace: namespace.into(), algorithm: algorithm.parse()? })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Token for `user_id` in `queue`
    pub fn generate(&self, queue: &str, user_id: i64) -> QueueToken {
        let input = format!("{}-{}-{}", self.namespace, queue, user_id);
        QueueToken(hex::encode(self.algorithm.digest(input.as_bytes())))
    }

    /// Check a presented token. Hex case is not significant.
    pub fn verify(&self, queue: &str, user_id: i64, candidate: &str) -> bool {
        self.generate(queue, user_id).as_str().eq_ignore_ascii_case(candidate)
    }

    /// Cookie name under which the token for `queue` is delivered
    pub fn cookie_name(&self, queue: &str) -> String {
        format!("{}-{}-token", self.namespace, queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let issuer = TokenIssuer::default();
        assert_eq!(
            issuer.generate("default", 42).as_str(),
            "cbd7a411a4a151308aa4690d13440df06b97d8a156fa822880c4a11f54ccb34f"
        );
        assert_eq!(
            issuer.generate("concert", 7).as_str(),
            "1407ccf6348d78430a4bcd5868fbbb0982bd4d6b43c9096e0d0024560122252d"
        );
    }

    #[test]
    fn test_token_shape() {
        let token = TokenIssuer::default().generate("default", -5);
        assert_eq!(token.as_str().len(), 64);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_is_deterministic_and_scoped() {
        let issuer = TokenIssuer::default();
        assert_eq!(issuer.generate("a", 1), issuer.generate("a", 1));
        assert_ne!(issuer.generate("a", 1), issuer.generate("b", 1));
        assert_ne!(issuer.generate("a", 1), issuer.generate("a", 2));
    }

    #[test]
    fn test_verify_ignores_hex_case() {
        let issuer = TokenIssuer::default();
        let token = issuer.generate("default", 42);

        assert!(issuer.verify("default", 42, token.as_str()));
        assert!(issuer.verify("default", 42, &token.as_str().to_uppercase()));
        assert!(!issuer.verify("default", 43, token.as_str()));
        assert!(!issuer.verify("default", 42, ""));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert_eq!(
            TokenIssuer::new("user-queue", "md5").unwrap_err(),
            TokenError::HashAlgorithmUnavailable("md5".to_string())
        );
        assert!(TokenIssuer::new("user-queue", "SHA-256").is_ok());
    }

    #[test]
    fn test_cookie_name() {
        assert_eq!(TokenIssuer::default().cookie_name("default"), "user-queue-default-token");
    }
}
