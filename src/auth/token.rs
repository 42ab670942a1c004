//! Bearer token issuance and verification.
//!
//! Tokens are compact HS256 JWTs carrying a `username` claim. Verification
//! never distinguishes a forged token from an expired one.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Upper bound on a token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing secret must not be empty")]
    EmptySecret,
    #[error("token lifetime must not exceed {max_secs} seconds")]
    TtlTooLong { max_secs: u64 },
    #[error("token expiry is outside the representable time range")]
    ExpiryOutOfRange,
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid or expired token")]
    InvalidOrExpired,
}

/// Identity asserted by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub username: String,
}

impl IdentityClaims {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Claims recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct TokenService {
    key: Arc<HS256Key>,
    ttl: Duration,
    issuer: Option<String>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl.as_secs())
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        ttl: std::time::Duration,
        issuer: Option<String>,
    ) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        Ok(Self {
            key: Arc::new(HS256Key::from_bytes(secret)),
            ttl: bounded_ttl(ttl)?,
            issuer,
        })
    }

    pub fn issue(&self, claims: &IdentityClaims) -> Result<IssuedToken, TokenError> {
        self.issue_at(claims, self.ttl, Clock::now_since_epoch())
    }

    pub fn issue_with_ttl(
        &self,
        claims: &IdentityClaims,
        ttl: std::time::Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(claims, bounded_ttl(ttl)?, Clock::now_since_epoch())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        claims: &IdentityClaims,
        ttl: Duration,
        now: UnixTimeStamp,
    ) -> Result<IssuedToken, TokenError> {
        // JWT timestamps are whole seconds.
        let now = Duration::from_secs(now.as_secs());
        if ttl.as_secs() > MAX_TOKEN_TTL_SECS {
            return Err(TokenError::TtlTooLong {
                max_secs: MAX_TOKEN_TTL_SECS,
            });
        }
        let expires_at = now
            .checked_add(ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;

        let mut jwt = Claims::with_custom_claims(claims.clone(), ttl)
            .with_jwt_id(Uuid::new_v4().to_string());
        jwt.issued_at = Some(now);
        jwt.invalid_before = Some(now);
        jwt.expires_at = Some(expires_at);

        if let Some(issuer) = &self.issuer {
            jwt = jwt.with_issuer(issuer);
        }

        let token = self
            .key
            .authenticate(jwt)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: expires_at.as_secs(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        self.verify_with(token, None)
    }

    /// Verifies `token` as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: UnixTimeStamp) -> Result<VerifiedClaims, TokenError> {
        self.verify_with(token, Some(now))
    }

    fn verify_with(
        &self,
        token: &str,
        now: Option<UnixTimeStamp>,
    ) -> Result<VerifiedClaims, TokenError> {
        if !has_canonical_signature(token) {
            return Err(TokenError::InvalidOrExpired);
        }

        let options = VerificationOptions {
            time_tolerance: Some(Duration::from_secs(0)),
            allowed_issuers: self
                .issuer
                .as_ref()
                .map(|issuer| HashSet::from([issuer.clone()])),
            artificial_time: now,
            ..Default::default()
        };

        let data = self
            .key
            .verify_token::<IdentityClaims>(token, Some(options))
            .map_err(|_| TokenError::InvalidOrExpired)?;

        let exp = data.expires_at.ok_or(TokenError::InvalidOrExpired)?;

        Ok(VerifiedClaims {
            username: data.custom.username,
            iat: data.issued_at.map(|t| t.as_secs()).unwrap_or(0),
            exp: exp.as_secs(),
        })
    }
}

fn bounded_ttl(ttl: std::time::Duration) -> Result<Duration, TokenError> {
    if ttl.as_secs() > MAX_TOKEN_TTL_SECS {
        return Err(TokenError::TtlTooLong {
            max_secs: MAX_TOKEN_TTL_SECS,
        });
    }
    Ok(Duration::from_secs(ttl.as_secs()))
}

/// The signature segment must be the one canonical unpadded base64url
/// encoding of its bytes. The decoder used for verification ignores the
/// unused low bits of the final character, so several strings would
/// otherwise map to the same signature.
fn has_canonical_signature(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(_), Some(_), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(signature)
        .is_ok()
}
