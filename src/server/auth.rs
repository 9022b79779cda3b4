//! Single-user bearer token authentication.
//!
//! Every request re-validates the static API token; there are no sessions.
//! A valid token always resolves to the same operator identity.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

use crate::core::constants::BEARER_SCHEME;
use crate::core::settings::Settings;
use crate::core::store::{Identity, IdentityStore};
use crate::error::AuthError;
use crate::server::AppState;

/// Extract the bearer credential from a raw `Authorization` header value.
///
/// Returns `Ok(None)` when there is no header or it uses another scheme,
/// so other authenticators may still handle it.
///
/// # Errors
///
/// `AuthError::MalformedHeader` if the value is not UTF-8 or does not
/// split into exactly a scheme and a credential.
pub fn bearer_credential(header: Option<&[u8]>) -> Result<Option<&str>, AuthError> {
    let Some(raw) = header.filter(|h| !h.is_empty()) else {
        return Ok(None);
    };

    let text = std::str::from_utf8(raw).map_err(|_| AuthError::MalformedHeader)?;
    let mut parts = text.split_whitespace();
    let (Some(scheme), Some(credential), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedHeader);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        debug!(scheme, "ignoring non-bearer authorization scheme");
        return Ok(None);
    }

    Ok(Some(credential))
}

/// Check `supplied` against the configured token in constant time.
///
/// Both sides are hashed first so the comparison does not leak the
/// configured token's length either.
///
/// # Errors
///
/// `AuthError::NotConfigured` if no token is configured,
/// `AuthError::InvalidToken` on mismatch.
pub fn verify_token(supplied: &str, configured: Option<&str>) -> Result<(), AuthError> {
    let expected = configured
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::NotConfigured)?;

    let supplied = Sha256::digest(supplied.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    if bool::from(supplied.as_slice().ct_eq(expected.as_slice())) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Validates bearer tokens and resolves the operator identity.
#[derive(Clone)]
pub struct SingleUserAuthenticator {
    settings: Arc<Settings>,
    store: Arc<dyn IdentityStore>,
}

impl SingleUserAuthenticator {
    pub fn new(settings: Arc<Settings>, store: Arc<dyn IdentityStore>) -> Self {
        Self { settings, store }
    }

    /// Authenticate a request from its `Authorization` header.
    ///
    /// `Ok(None)` means no bearer credential was supplied.
    pub async fn authenticate(&self, header: Option<&[u8]>) -> Result<Option<Identity>, AuthError> {
        let Some(credential) = bearer_credential(header)? else {
            return Ok(None);
        };

        verify_token(credential, self.settings.api_token())?;

        let identity = self.store.resolve_operator().await?;
        Ok(Some(identity))
    }
}

/// Middleware guarding every route it wraps.
///
/// Inserts the resolved [`Identity`] into request extensions.
pub async fn require_operator(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.as_bytes().to_vec());

    match state.authenticator.authenticate(header.as_deref()).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => unauthorized("authentication required"),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::MalformedHeader | Self::InvalidToken => {
                warn!(reason = %self, "rejected credentials");
                unauthorized("invalid credentials")
            }
            Self::NotConfigured => {
                error!("request rejected: API token is not configured");
                server_error()
            }
            Self::Store(e) => {
                error!(error = %e, "identity store failure during authentication");
                server_error()
            }
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BEARER_SCHEME));
    response
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal server error" })),
    )
        .into_response()
}
