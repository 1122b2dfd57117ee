//! JWT principals for the despacho server.
//!
//! Every request carries at most one bearer token. The access gate resolves
//! it into a [`Principal`] and stores it in the request extensions; handlers
//! then use the [`Operator`] and [`TenantMember`] extractors.
//!
//! # Claims
//!
//! - `sub` - user id, the key of `user_profiles`
//! - `scope` - space-separated; `superuser` marks platform operators
//!
//! # Configuration
//!
//! - `DESPACHO_JWT_SECRET` - Required secret key for HS256 signing
//! - `DESPACHO_JWT_ISSUER` - Expected issuer claim (default: "despacho")
//! - `DESPACHO_JWT_AUDIENCE` - Expected audience claim (default: "despacho-app")

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::errors::{DespachoError, DespachoResult};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::database::TenantProfile;

/// Scope granted to platform operators.
pub const SUPERUSER_SCOPE: &str = "superuser";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
    /// Scopes (space-separated list)
    #[serde(default)]
    pub scope: String,
}

impl Claims {
    pub fn has_scope(&self, required: &str) -> bool {
        self.scope
            .split_whitespace()
            .any(|s| s == required || s == "*")
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Authorization header is not `Bearer <token>`
    InvalidHeader,
    InvalidToken(String),
    TokenExpired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidHeader => write!(f, "invalid authorization header format"),
            AuthError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            AuthError::TokenExpired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match err {
            AuthError::InvalidHeader => ErrorCode::InvalidHeader,
            AuthError::InvalidToken(_) => ErrorCode::InvalidToken,
            AuthError::TokenExpired => ErrorCode::TokenExpired,
        };
        ApiError::with_message(code, err.to_string())
    }
}

/// JWT validator for token verification.
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiration_secs: u64,
}

impl JwtValidator {
    /// Create a validator from auth configuration.
    ///
    /// A secret of the form `env:VAR_NAME` is read from that variable.
    pub fn from_config(config: &AuthConfig) -> DespachoResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(DespachoError::ConfigError(
                "jwt_secret is required".to_string(),
            ));
        }

        let secret = if let Some(env_var) = config.jwt_secret.strip_prefix("env:") {
            std::env::var(env_var).map_err(|_| {
                DespachoError::ConfigError(format!(
                    "environment variable '{env_var}' not found for jwt_secret"
                ))
            })?
        } else {
            config.jwt_secret.clone()
        };

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiration_secs: config.token_expiration_secs,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }

    /// Issue a token for `subject` with the given scopes.
    pub fn create_token(&self, subject: &str, scopes: &[&str]) -> DespachoResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| DespachoError::ServerError(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            scope: scopes.join(" "),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DespachoError::ServerError(format!("failed to create token: {e}")))
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

/// Token validation shared by every handler.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub validator: Arc<JwtValidator>,
}

impl AuthState {
    pub fn from_config(config: &AuthConfig) -> DespachoResult<Self> {
        Ok(Self {
            validator: Arc::new(JwtValidator::from_config(config)?),
        })
    }

    /// Claims of the bearer token, `None` when no Authorization header is sent.
    pub fn bearer_claims(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        let Some(value) = headers.get("Authorization") else {
            return Ok(None);
        };

        let token = value
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidHeader)?;

        Ok(Some(self.validator.validate_token(token)?.claims))
    }
}

/// Who is making the request.
///
/// Operators are recognised from their token alone; everyone else needs a
/// tenant profile, which may be missing.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Superuser {
        subject: String,
    },
    Member {
        user_id: String,
        profile: Option<TenantProfile>,
    },
}

/// Credential failure seen on a bypass route.
///
/// The gate lets bypass routes through with [`Principal::Anonymous`] and
/// parks the failure here, so extractors that need a caller report it.
#[derive(Debug, Clone)]
pub struct AuthFailure(pub ApiError);

fn anonymous_rejection(parts: &Parts) -> ApiError {
    parts
        .extensions
        .get::<AuthFailure>()
        .map(|failure| failure.0.clone())
        .unwrap_or_else(|| ApiError::new(ErrorCode::MissingToken))
}

/// Extractor for operator-only handlers.
#[derive(Debug, Clone)]
pub struct Operator {
    pub subject: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::Superuser { subject }) => Ok(Operator {
                subject: subject.clone(),
            }),
            Some(Principal::Member { .. }) => Err(ApiError::with_message(
                ErrorCode::InsufficientScope,
                "operator access required",
            )),
            Some(Principal::Anonymous) | None => Err(anonymous_rejection(parts)),
        }
    }
}

/// Extractor for handlers acting on the caller's own tenant.
#[derive(Debug, Clone)]
pub struct TenantMember {
    pub user_id: String,
    pub profile: TenantProfile,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantMember
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::Member {
                user_id,
                profile: Some(profile),
            }) => Ok(TenantMember {
                user_id: user_id.clone(),
                profile: profile.clone(),
            }),
            Some(Principal::Member { profile: None, .. }) => {
                Err(ApiError::new(ErrorCode::ProfileMissing))
            }
            Some(Principal::Superuser { .. }) => Err(ApiError::with_message(
                ErrorCode::InsufficientScope,
                "operators do not belong to a tenant",
            )),
            Some(Principal::Anonymous) | None => Err(anonymous_rejection(parts)),
        }
    }
}
