//! Authentication middleware, bearer token handling and command rate limiting

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::app::AppState;
use crate::http::routes::AppError;
use crate::race::ParticipantId;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a participant token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (participant ID)
    pub sub: ParticipantId,
    /// Display name chosen at issue time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
}

fn now_secs() -> u64 {
    crate::util::time::unix_millis() / 1_000
}

fn sign(message: &str, secret: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// Issue an HS256 token for `participant`, valid for `ttl_secs`
pub fn issue_token(
    participant: ParticipantId,
    name: Option<String>,
    ttl_secs: u64,
    secret: &str,
) -> Result<String, AuthError> {
    let iat = now_secs();
    let claims = TokenClaims {
        sub: participant,
        name,
        exp: iat + ttl_secs,
        iat,
    };

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
    let message = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));

    let signature = sign(&message, secret)?.finalize().into_bytes();
    Ok(format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify a token and extract claims
pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);
    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    sign(&message, secret)?
        .verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: TokenClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp < now_secs() {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Extract token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Authenticated participant, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedParticipant {
    pub participant: ParticipantId,
    pub claims: TokenClaims,
}

/// Middleware to require a valid bearer token
pub async fn require_participant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidFormat)?;

    let claims = verify_token(token, &state.config.token_secret)?;

    let auth = AuthenticatedParticipant {
        participant: claims.sub,
        claims,
    };

    // Insert into request extensions for handlers to access
    request.extensions_mut().insert(auth);

    Ok(next.run(request).await)
}

/// Middleware to cap commands per participant; runs after `require_participant`
pub async fn limit_commands(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let participant = request
        .extensions()
        .get::<AuthenticatedParticipant>()
        .map(|auth| auth.participant)
        .ok_or(AppError::Unauthorized)?;

    if !state.limiter.check(participant) {
        debug!(participant = %participant, "Command rate limited");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}
