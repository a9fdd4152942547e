//! Bearer-token auth for the board API.
//!
//! - Tokens are HS256 JWTs whose `sub` claim is the owner id
//! - Accepted from `Authorization: Bearer <jwt>` or a `token` cookie
//! - When `DEV_MODE=true`, requests without a token act as `DEV_USER_ID`
//!
//! Token issuance (login, registration) happens elsewhere; [`issue_token`] is
//! provided for tooling and tests that share the secret.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use super::routes::AppState;
use super::types::ErrorResponse;
use crate::board::OwnerId;
use crate::util::cookie_value;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Owner id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: OwnerId,
}

/// Sign a token for `owner`, valid for `ttl_days` (at least one).
pub fn issue_token(secret: &str, owner: &OwnerId, ttl_days: i64) -> anyhow::Result<String> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: owner.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            message: message.to_string(),
            errors: Vec::new(),
        }),
    )
        .into_response()
}

fn request_token(req: &Request<Body>) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    req.headers()
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| cookie_value(h, "token"))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = request_token(&req);
    let auth = &state.config.auth;

    let user = match (token, auth.jwt_secret.as_deref()) {
        (None, _) if state.config.dev_mode => AuthUser {
            id: OwnerId::new(auth.dev_user_id.clone()),
        },
        (None, _) => return unauthorized("Unauthorized"),
        (Some(_), None) if state.config.dev_mode => AuthUser {
            id: OwnerId::new(auth.dev_user_id.clone()),
        },
        // Fail closed when no secret is configured outside dev mode.
        (Some(_), None) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
        (Some(token), Some(secret)) => match verify_jwt(&token, secret) {
            Ok(claims) => AuthUser {
                id: OwnerId::new(claims.sub),
            },
            Err(e) => {
                tracing::debug!("Rejected token: {}", e);
                return unauthorized("Invalid token");
            }
        },
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
