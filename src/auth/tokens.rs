//! Access and refresh token minting and verification.
//!
//! The two token kinds are signed with distinct HMAC secrets, so a refresh
//! token can never pass as an access token even if the type claim is
//! tampered with. Verification failures are typed; callers must not
//! conflate an expired token with a forged one.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is expired")]
    Expired,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token is invalid")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    /// "access" or "refresh"
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn is_access(&self) -> bool {
        self.token_type == "access"
    }

    #[must_use]
    pub fn is_refresh(&self) -> bool {
        self.token_type == "refresh"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn mint_access(&self, user_id: i32, role: Role) -> Result<String, TokenError> {
        self.mint(user_id, role, "access", self.access_ttl_secs, &self.access_encoding)
    }

    pub fn mint_refresh(&self, user_id: i32, role: Role) -> Result<String, TokenError> {
        self.mint(
            user_id,
            role,
            "refresh",
            self.refresh_ttl_secs,
            &self.refresh_encoding,
        )
    }

    pub fn mint_pair(&self, user_id: i32, role: Role) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.mint_access(user_id, role)?,
            refresh_token: self.mint_refresh(user_id, role)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = Self::verify(token, &self.access_decoding)?;
        if !claims.is_access() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = Self::verify(token, &self.refresh_decoding)?;
        if !claims.is_refresh() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    fn mint(
        &self,
        user_id: i32,
        role: Role,
        token_type: &str,
        ttl_secs: i64,
        key: &EncodingKey,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            token_type: token_type.to_string(),
            iat: now,
            exp: now + ttl_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, key).map_err(|_| TokenError::Invalid)
    }

    fn verify(token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data =
            jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    TokenError::Malformed
                }
                _ => TokenError::Invalid,
            })?;

        Ok(data.claims)
    }
}
