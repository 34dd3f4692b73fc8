use axum::http::{HeaderMap, StatusCode};
use ulid::Ulid;

use super::{ApiError, AppState, json_error};
use crate::config::AuthMode;

pub(super) const USER_HEADER: &str = "x-workspaces-user";
pub(super) const LOCAL_AUTH_SECRET_HEADER: &str = "x-workspaces-local-auth-secret";
pub(super) const REQUEST_ID_HEADER: &str = "x-workspaces-request-id";

/// Resolves the caller's username.
///
/// In local mode a missing user header yields `Ok(None)`; the handlers turn
/// that into the unauthenticated error themselves.
pub(super) async fn extract_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<String>, ApiError> {
    match state.config.auth_mode {
        AuthMode::Local => {
            validate_local_auth_shared_secret(
                headers,
                state.config.local_auth_shared_secret.as_deref(),
            )?;
            Ok(header_str(headers, USER_HEADER).map(|v| v.to_string()))
        }
        AuthMode::Oidc => {
            let Some(auth) = state.oidc.as_ref() else {
                return Err(json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ERR_INTERNAL",
                    "oidc authenticator is not initialized",
                    false,
                ));
            };

            auth.authenticate(headers)
                .await
                .map(|identity| Some(identity.username))
                .map_err(|err| match err.code {
                    "ERR_AUTH_UNAVAILABLE" => json_error(
                        StatusCode::SERVICE_UNAVAILABLE,
                        err.code,
                        err.message,
                        true,
                    ),
                    _ => json_error(StatusCode::UNAUTHORIZED, err.code, err.message, false),
                })
        }
    }
}

fn validate_local_auth_shared_secret(
    headers: &HeaderMap,
    expected_secret: Option<&str>,
) -> Result<(), ApiError> {
    let Some(expected_secret) = expected_secret else {
        return Ok(());
    };

    let provided_secret = header_str(headers, LOCAL_AUTH_SECRET_HEADER).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "ERR_AUTH_REQUIRED",
            "missing local auth secret",
            false,
        )
    })?;

    if provided_secret != expected_secret {
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "ERR_AUTH_INVALID",
            "invalid local auth secret",
            false,
        ));
    }

    Ok(())
}

pub(super) fn extract_request_id(headers: &HeaderMap) -> String {
    header_str(headers, REQUEST_ID_HEADER)
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}
