//! Bearer-token verification and origin policy for the upgrade endpoint

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AuthError, RelayError};
use crate::state::AppState;

/// Claims we read from a verified token. Unknown claims are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Stateless check of HMAC-signed bearer tokens against a shared secret
#[derive(Clone)]
pub struct CredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // exp is still checked when present, just not mandatory
        validation.required_spec_claims.clear();
        // Any audience is accepted unless one is configured
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Only accept tokens whose `aud` claim names `audience`
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Verify a raw token (without the `Bearer ` prefix)
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Verify the `Authorization: Bearer <token>` header of a request
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?;
        let value = value.to_str().map_err(|_| AuthError::NotBearer)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotBearer)?;
        self.verify_token(token)
    }
}

/// Case-insensitive match of the request's `Origin` against the allow-list.
/// A missing origin never matches.
pub fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
}

/// Middleware rejecting upgrade requests without a valid bearer token.
///
/// Verified claims are stored in the request extensions for the handler.
pub async fn bearer_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match state.verifier.verify_headers(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!("Rejected upgrade to {}: {}", request.uri(), e);
            RelayError::AuthRejected(e).into_response()
        }
    }
}

/// Middleware refusing upgrades from origins outside the allow-list
pub async fn origin_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if origin_allowed(request.headers(), &state.config.allowed_origins) {
        return next.run(request).await;
    }

    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    tracing::warn!("Rejected upgrade from origin {:?}: not allowed", origin);
    RelayError::OriginRejected(origin).into_response()
}
