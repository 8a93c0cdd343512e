//! JWT access-token validation.
//!
//! Access tokens are HS256-signed JWTs carrying a [`Claims`] payload. They
//! are issued by the account service; [`generate_access_token`] exists for
//! tests and operator tooling.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use taleforge_core::types::DbId;
use uuid::Uuid;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Role name (`"admin"`, `"reader"`).
    pub role: String,
    /// Subscription plan (`"free"`, `"premium"`).
    pub plan: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier.
    pub jti: String,
}

/// Configuration for JWT validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Lifetime of tokens minted by [`generate_access_token`].
    pub access_token_expiry_mins: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        Self {
            secret,
            access_token_expiry_mins,
        }
    }
}

/// Generate an HS256 access token.
pub fn generate_access_token(
    user_id: DbId,
    role: &str,
    plan: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        plan: plan.to_string(),
        exp: now + config.access_token_expiry_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode an access token, returning the embedded [`Claims`].
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
