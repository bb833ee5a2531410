//! Error types for the relay.
//!
//! Every per-connection failure is contained: it ends that connection and
//! nothing else. Only `RelayError` ever becomes an HTTP response.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Why a bearer credential was rejected
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a Bearer credential")]
    NotBearer,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Failure to push a frame onto a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("connection is gone")]
    Disconnected,
}

/// Failures that terminate a single connection
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("read failed: {0}")]
    Read(#[source] axum::Error),

    #[error("no traffic within read deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("write failed: {0}")]
    Write(#[source] axum::Error),
}

/// Errors surfaced to the upgrading client before any connection exists
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("authentication rejected: {0}")]
    AuthRejected(#[from] AuthError),

    #[error("origin not allowed: {0:?}")]
    OriginRejected(Option<String>),

    #[error("websocket upgrade failed: {0}")]
    UpgradeFailed(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::AuthRejected(_) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                "Unauthorized",
            )
                .into_response(),
            RelayError::OriginRejected(_) => {
                (StatusCode::FORBIDDEN, "Origin not allowed").into_response()
            }
            RelayError::UpgradeFailed(reason) => {
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
        }
    }
}

/// Invalid or missing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection_is_unauthorized() {
        let response = RelayError::AuthRejected(AuthError::MissingHeader).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_origin_and_upgrade_statuses() {
        let response = RelayError::OriginRejected(Some("http://evil.test".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = RelayError::UpgradeFailed("bad handshake".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
