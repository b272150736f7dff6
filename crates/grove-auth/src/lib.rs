#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-auth** – Authentication primitives for Grove.
//!
//! This crate defines the canonical [`Claims`] structure and the paired
//! HS256 JWT implementation ([`JwtHs256Signer`] / [`JwtHs256Validator`])
//! used by the HTTP service: a short-lived *session* token authorizes API
//! calls and a long-lived *refresh* token mints replacements. Password
//! verification is bcrypt.

use serde::{Deserialize, Serialize};

/// Session token lifetime: one hour.
pub const SESSION_TTL_SECS: u64 = 60 * 60;

/// Refresh token lifetime: seven days.
pub const REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

//─────────────────────────────
//  Claims
//─────────────────────────────

/// Discriminates the two token roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived token that authorizes API calls.
    Session,
    /// Long-lived token exchanged for new session tokens.
    Refresh,
}

/// Canonical claim set embedded in every Grove token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user identifier.
    pub user_id: String,
    /// Login name, echoed for convenience.
    pub username: String,
    /// Session or refresh.
    pub token_type: TokenKind,
    /// Issued-at timestamp (seconds since Unix epoch).
    pub iat: u64,
    /// Absolute expiry timestamp (seconds since Unix epoch).
    pub exp: u64,
}

/// The session/refresh pair returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Serialized session JWT.
    pub session_token: String,
    /// Serialized refresh JWT.
    pub refresh_token: String,
}

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Failures produced while minting or validating credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token could not be signed.
    #[error("failed to mint token: {0}")]
    Mint(String),
    /// Signature, structure or expiry check failed.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// Token is authentic but of the wrong role.
    #[error("wrong token type: expected {expected:?}, got {got:?}")]
    WrongTokenType {
        /// Role the caller required.
        expected: TokenKind,
        /// Role the token carried.
        got: TokenKind,
    },
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for grove_types::ForestError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hash(msg) | AuthError::Mint(msg) => {
                grove_types::ForestError::Internal(msg)
            }
            other => grove_types::ForestError::Unauthenticated(other.to_string()),
        }
    }
}

/// Crate result helper.
pub type Result<T> = std::result::Result<T, AuthError>;

//─────────────────────────────
//  Passwords
//─────────────────────────────

/// Hash a cleartext password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a cleartext password against a stored bcrypt hash.
///
/// A malformed stored hash verifies as false rather than erroring, so a
/// corrupted record cannot be brute-forced into a 500.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

//─────────────────────────────
//  HS256 implementation
//─────────────────────────────

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Construct claims for `kind` with the standard TTL.
pub fn build_claims(user_id: &str, username: &str, kind: TokenKind) -> Claims {
    let ttl = match kind {
        TokenKind::Session => SESSION_TTL_SECS,
        TokenKind::Refresh => REFRESH_TTL_SECS,
    };
    let iat = unix_now();
    Claims {
        user_id: user_id.to_owned(),
        username: username.to_owned(),
        token_type: kind,
        iat,
        exp: iat + ttl,
    }
}

/// Mints HS256 tokens with the server-wide signing secret.
#[derive(Clone)]
pub struct JwtHs256Signer {
    secret: String,
}

impl std::fmt::Debug for JwtHs256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtHs256Signer").finish_non_exhaustive()
    }
}

impl JwtHs256Signer {
    /// Create a signer for `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Sign an arbitrary claim set.
    pub fn mint_claims(&self, claims: &Claims) -> Result<String> {
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        jsonwebtoken::encode(
            &header,
            claims,
            &jsonwebtoken::EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Mint(e.to_string()))
    }

    /// Mint one token of `kind` for the given user.
    pub fn mint(&self, user_id: &str, username: &str, kind: TokenKind) -> Result<String> {
        self.mint_claims(&build_claims(user_id, username, kind))
    }

    /// Mint the session/refresh pair issued at login.
    pub fn mint_pair(&self, user_id: &str, username: &str) -> Result<TokenPair> {
        Ok(TokenPair {
            session_token: self.mint(user_id, username, TokenKind::Session)?,
            refresh_token: self.mint(user_id, username, TokenKind::Refresh)?,
        })
    }
}

/// Verifies HS256 tokens and enforces the expected role.
#[derive(Clone)]
pub struct JwtHs256Validator {
    secret: String,
    validation: jsonwebtoken::Validation,
}

impl std::fmt::Debug for JwtHs256Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtHs256Validator").finish_non_exhaustive()
    }
}

impl JwtHs256Validator {
    /// Create a validator for `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self { secret: secret.into(), validation }
    }

    /// Verify authenticity and expiry, returning the embedded claims.
    pub fn validate(&self, raw: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(
            raw,
            &jsonwebtoken::DecodingKey::from_secret(self.secret.as_bytes()),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AuthError::Invalid(e.to_string()))
    }

    /// Verify and additionally require the token role.
    pub fn validate_kind(&self, raw: &str, expected: TokenKind) -> Result<Claims> {
        let claims = self.validate(raw)?;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType {
                expected,
                got: claims.token_type,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn pair_round_trips() {
        let signer = JwtHs256Signer::new(SECRET);
        let validator = JwtHs256Validator::new(SECRET);
        let pair = signer.mint_pair("u1", "alice").unwrap();

        let session = validator
            .validate_kind(&pair.session_token, TokenKind::Session)
            .unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.username, "alice");
        assert_eq!(session.exp - session.iat, SESSION_TTL_SECS);

        let refresh = validator
            .validate_kind(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.exp - refresh.iat, REFRESH_TTL_SECS);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let signer = JwtHs256Signer::new(SECRET);
        let validator = JwtHs256Validator::new("a-different-secret");
        let token = signer.mint("u1", "alice", TokenKind::Session).unwrap();
        assert!(matches!(validator.validate(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = JwtHs256Signer::new(SECRET);
        let validator = JwtHs256Validator::new(SECRET);
        let stale = Claims {
            user_id: "u1".into(),
            username: "alice".into(),
            token_type: TokenKind::Session,
            iat: 1_000,
            exp: 2_000,
        };
        let token = signer.mint_claims(&stale).unwrap();
        assert!(matches!(validator.validate(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn refresh_token_is_not_a_session_token() {
        let signer = JwtHs256Signer::new(SECRET);
        let validator = JwtHs256Validator::new(SECRET);
        let token = signer.mint("u1", "alice", TokenKind::Refresh).unwrap();
        assert!(matches!(
            validator.validate_kind(&token, TokenKind::Session),
            Err(AuthError::WrongTokenType { .. })
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let validator = JwtHs256Validator::new(SECRET);
        assert!(validator.validate("not-a-jwt").is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("p").unwrap();
        assert!(verify_password("p", &hash));
        assert!(!verify_password("x", &hash));
        assert!(!verify_password("p", "not-a-bcrypt-hash"));
    }
}
