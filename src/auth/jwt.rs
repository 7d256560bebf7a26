//! Session token handling
//!
//! Short-lived access tokens plus longer refresh tokens, both HS256 with
//! issuer/audience labels. A refresh token carries a `jti` that must match
//! the value persisted on the user record, so rotating that value revokes
//! every outstanding refresh token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::shared::ids;

const ISSUER: &str = "stackpark";
const AUDIENCE: &str = "stackpark-api";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_expire_days: i64,
    pub refresh_expire_days: i64,
}

impl JwtConfig {
    pub fn from_security(cfg: &SecurityConfig) -> Self {
        Self {
            access_secret: cfg.jwt_secret.clone(),
            refresh_secret: cfg.jwt_refresh_secret.clone(),
            access_expire_days: cfg.jwt_expire_days,
            refresh_expire_days: cfg.jwt_refresh_expire_days,
        }
    }
}

/// Claims carried by both token kinds
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Operator code, e.g. `OP123`
    pub operator_id: String,
    /// Global role
    pub role: String,
    /// Refresh binding; only set on refresh tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

impl Claims {
    fn new(
        user_id: &str,
        operator_id: &str,
        role: &str,
        expire_days: i64,
        jti: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            operator_id: operator_id.to_string(),
            role: role.to_string(),
            jti,
            exp: (now + Duration::days(expire_days)).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        }
    }
}

fn validation() -> Validation {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation
}

/// Issue a short-lived access token.
pub fn issue_access_token(
    user_id: &str,
    operator_id: &str,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, operator_id, role, config.access_expire_days, None);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
}

/// Issue a refresh token. Returns `(token, jti)`; the caller persists the
/// jti on the user record.
pub fn issue_refresh_token(
    user_id: &str,
    operator_id: &str,
    role: &str,
    config: &JwtConfig,
) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let jti = ids::opaque_token();
    let claims = Claims::new(
        user_id,
        operator_id,
        role,
        config.refresh_expire_days,
        Some(jti.clone()),
    );
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )?;
    Ok((token, jti))
}

/// Verify an access token. HMAC comparison inside jsonwebtoken is
/// constant-time.
pub fn verify_access_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation(),
    )?;
    Ok(data.claims)
}

/// Verify a refresh token and check its binding against the value on the
/// user record.
pub fn verify_refresh_token(
    token: &str,
    bound_jti: Option<&str>,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &validation(),
    )?;
    if data.claims.jti.as_deref() != bound_jti || bound_jti.is_none() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            access_secret: "test-access".into(),
            refresh_secret: "test-refresh".into(),
            access_expire_days: 7,
            refresh_expire_days: 30,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let cfg = config();
        let token = issue_access_token("u1", "OP100", "operator", &cfg).unwrap();
        let claims = verify_access_token(&token, &cfg).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.operator_id, "OP100");
        assert_eq!(claims.role, "operator");
        assert!(claims.jti.is_none());
    }

    #[test]
    fn refresh_token_requires_matching_binding() {
        let cfg = config();
        let (token, jti) = issue_refresh_token("u1", "OP100", "operator", &cfg).unwrap();

        assert!(verify_refresh_token(&token, Some(&jti), &cfg).is_ok());
        assert!(verify_refresh_token(&token, Some("rotated"), &cfg).is_err());
        assert!(verify_refresh_token(&token, None, &cfg).is_err());
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let cfg = config();
        let access = issue_access_token("u1", "OP100", "admin", &cfg).unwrap();
        // An access token cannot pass refresh verification (different secret).
        assert!(verify_refresh_token(&access, Some("x"), &cfg).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_access_token("not-a-token", &config()).is_err());
    }
}
