//! Authentication primitives and the per-request caller context.
//!
//! Tokens are HS256 JWTs. Handlers never look up "the current user" from
//! ambient state; they extract a [`RequestContext`] and pass it down to the
//! services explicitly.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Role;
use crate::AppState;

/// Header carrying the anonymous shopper's cart key.
pub const SESSION_CART_HEADER: &str = "x-session-cart-id";

/// JWT claims issued on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub name: String,
    pub email: String,
    pub role: Role,
    pub iat: usize, // Issued at
    pub exp: usize, // Expiration time
}

/// The signed-in caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Who is calling, threaded into every service entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user: Option<CurrentUser>,
    pub session_cart_id: Option<String>,
}

impl RequestContext {
    pub fn anonymous(session_cart_id: impl Into<String>) -> Self {
        Self {
            user: None,
            session_cart_id: Some(session_cart_id.into()),
        }
    }

    pub fn for_user(id: Uuid, role: Role) -> Self {
        Self {
            user: Some(CurrentUser { id, role }),
            session_cart_id: None,
        }
    }

    pub fn with_session(mut self, session_cart_id: impl Into<String>) -> Self {
        self.session_cart_id = Some(session_cart_id.into());
        self
    }

    pub fn require_user(&self) -> Result<CurrentUser, ServiceError> {
        self.user.ok_or(ServiceError::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<CurrentUser, ServiceError> {
        let user = self.require_user()?;
        if !user.is_admin() {
            return Err(ServiceError::Unauthorized(
                "Admin access required".to_string(),
            ));
        }
        Ok(user)
    }

    /// Owner may read it: the order's user or an admin.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.user
            .map(|user| user.id == owner_id || user.is_admin())
            .unwrap_or(false)
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("Failed to hash password: {}", e)))
}

/// `false` for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            debug!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

pub fn issue_token(
    secret: &str,
    lifetime_secs: usize,
    user_id: Uuid,
    name: &str,
    email: &str,
    role: Role,
) -> Result<String, ServiceError> {
    let now = chrono::Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        iat: now,
        exp: now + lifetime_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("Failed to create token: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServiceError::Unauthorized("Token expired".to_string())
        }
        _ => ServiceError::Unauthorized("Invalid token".to_string()),
    })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    /// A missing or invalid token yields an anonymous context; entry points
    /// that need a user reject it themselves.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts).and_then(|token| {
            match verify_token(&state.config.jwt_secret, token) {
                Ok(claims) => Uuid::parse_str(&claims.sub).ok().map(|id| CurrentUser {
                    id,
                    role: claims.role,
                }),
                Err(e) => {
                    debug!(error = %e, "Ignoring bearer token");
                    None
                }
            }
        });

        let session_cart_id = parts
            .headers
            .get(SESSION_CART_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            user,
            session_cart_id,
        })
    }
}
