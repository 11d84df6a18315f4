//! JWT session module.
//!
//! Session tokens are issued by the external login service and only
//! validated here. A token's claims become the tagged [`CallerContext`]
//! every service authorizes against.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! Claims { sub, staff_role? | biz_role? + business_id?, exp }
//!        │
//!        ├── staff_role            → CallerContext::Staff { username, role }
//!        ├── biz_role + business_id → CallerContext::Business { … }
//!        └── anything else          → Unauthorized
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shop_core::{BusinessRole, CallerContext, StaffRole};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Staff role, for staff sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_role: Option<String>,

    /// Business role, for tenant sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_role: Option<String>,

    /// Owning business, for tenant sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl TryFrom<Claims> for CallerContext {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| ApiError::unauthorized(format!("Malformed session: {}", reason));

        match (claims.staff_role, claims.biz_role, claims.business_id) {
            (Some(role), None, None) => {
                let role: StaffRole = role.parse().map_err(|_| malformed("unknown staff role"))?;
                Ok(CallerContext::staff(claims.sub, role))
            }
            (None, Some(role), Some(business_id)) => {
                let role: BusinessRole =
                    role.parse().map_err(|_| malformed("unknown business role"))?;
                Ok(CallerContext::business(claims.sub, role, business_id))
            }
            _ => Err(malformed("expected a staff role or a business role with businessId")),
        }
    }
}

impl Claims {
    fn for_caller(caller: &CallerContext, lifetime: Duration) -> Self {
        let exp = (Utc::now() + lifetime).timestamp();
        match caller {
            CallerContext::Staff { username, role } => Claims {
                sub: username.clone(),
                staff_role: Some(role.as_str().to_string()),
                biz_role: None,
                business_id: None,
                exp,
            },
            CallerContext::Business {
                username,
                role,
                business_id,
            } => Claims {
                sub: username.clone(),
                staff_role: None,
                biz_role: Some(role.as_str().to_string()),
                business_id: Some(business_id.clone()),
                exp,
            },
        }
    }
}

/// Validates session tokens (HS256, shared secret).
pub struct JwtManager {
    decoding: DecodingKey,
    encoding: EncodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        JwtManager {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate a token and resolve its caller.
    pub fn validate_token(&self, token: &str) -> Result<CallerContext, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        CallerContext::try_from(data.claims)
    }

    /// Sign a token for a caller, the way the login service does.
    ///
    /// Used by tests and local tooling; the server itself never issues sessions.
    pub fn issue_token(&self, caller: &CallerContext, lifetime: Duration) -> Result<String, ApiError> {
        encode(&Header::default(), &Claims::for_caller(caller, lifetime), &self.encoding)
            .map_err(ApiError::internal)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim)
}

/// The resolved caller of a request, `None` when no token was sent.
///
/// A token that is present but invalid rejects the request outright.
/// Whether an anonymous caller may proceed is decided by the permission
/// matrix, which denies `None` everywhere except the public catalog.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<CallerContext>);

impl Caller {
    pub fn context(&self) -> Option<&CallerContext> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller(None));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"))?;

        match state.jwt.validate_token(token) {
            Ok(caller) => Ok(Caller(Some(caller))),
            Err(err) => {
                warn!(uri = %parts.uri, error = %err, "Rejected session token");
                Err(err)
            }
        }
    }
}
