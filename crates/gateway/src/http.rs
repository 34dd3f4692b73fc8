use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::Instrument;
use workspaces_auth::OidcAuthenticator;
use workspaces_contracts::{Workspace, WorkspaceList};
use workspaces_core::{
    ListWorkspaceHandler, ListWorkspaceQuery, ReadClient, ReadWorkspaceHandler,
    ReadWorkspaceQuery, RequestContext, StoreError, WorkspaceError,
};

use crate::config::{AuthMode, GatewayConfig, StartupError};
use crate::store::HttpStoreClient;

mod identity;
mod params;

use self::identity::{REQUEST_ID_HEADER, extract_request_id, extract_user};
use self::params::{ListParams, ReadParams};

pub const LIST_ROUTE: &str = "/apis/workspaces.example/v1alpha1/workspaces";
pub const READ_ROUTE: &str = "/apis/workspaces.example/v1alpha1/namespaces/{owner}/workspaces/{name}";

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    oidc: Option<OidcAuthenticator>,
    store: HttpStoreClient,
    list_handler: ListWorkspaceHandler,
    read_handler: ReadWorkspaceHandler,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let oidc = if config.auth_mode == AuthMode::Oidc {
        let oidc_config = config.oidc.clone().ok_or_else(|| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "oidc auth mode requires oidc config".to_string(),
        })?;

        Some(
            OidcAuthenticator::new(oidc_config)
                .await
                .map_err(|err| StartupError {
                    code: err.code,
                    message: err.message,
                })?,
        )
    } else {
        None
    };

    let store = HttpStoreClient::new(
        &config.store_url,
        Duration::from_millis(config.store_timeout_ms),
    )
    .map_err(|err| StartupError {
        code: "ERR_STORE_CLIENT",
        message: format!("failed to initialize store client: {}", err),
    })?;

    let read_client = Arc::new(ReadClient::new(Arc::new(store.clone())));
    let state = AppState {
        config,
        oidc,
        store,
        list_handler: ListWorkspaceHandler::new(read_client.clone()),
        read_handler: ReadWorkspaceHandler::new(read_client),
    };

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route(LIST_ROUTE, get(list_workspaces))
        .route(READ_ROUTE, get(read_workspace))
        .with_state(state))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    let store_ready = state.store.ready().await.is_ok();
    checks.insert("store", store_ready);

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if state.config.metrics_require_auth {
        match extract_user(&state, &headers).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error_response(&WorkspaceError::Unauthenticated).into_response();
            }
            Err(err) => return err.into_response(),
        }
    }

    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn list_workspaces(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<(HeaderMap, Json<WorkspaceList>), ApiError> {
    let started = Instant::now();
    let result = serve_list(&state, &headers, params).await;
    observe(LIST_ROUTE, &result, started);
    result
}

async fn serve_list(
    state: &AppState,
    headers: &HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<(HeaderMap, Json<WorkspaceList>), ApiError> {
    let ctx = request_context(state, headers).await?;

    let Query(params) = params.map_err(|_| invalid_query())?;
    let options = params.into_options()?;

    let response = state
        .list_handler
        .handle(&ctx, ListWorkspaceQuery { options })
        .await
        .map_err(|err| error_response(&err))?;

    Ok((
        response_headers(ctx.request_id()),
        Json(response.workspaces),
    ))
}

async fn read_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, name)): Path<(String, String)>,
    params: Result<Query<ReadParams>, QueryRejection>,
) -> Result<(HeaderMap, Json<Workspace>), ApiError> {
    let started = Instant::now();
    let result = serve_read(&state, &headers, owner, name, params).await;
    observe(READ_ROUTE, &result, started);
    result
}

async fn serve_read(
    state: &AppState,
    headers: &HeaderMap,
    owner: String,
    name: String,
    params: Result<Query<ReadParams>, QueryRejection>,
) -> Result<(HeaderMap, Json<Workspace>), ApiError> {
    let ctx = request_context(state, headers).await?;

    let Query(params) = params.map_err(|_| invalid_query())?;
    let query = ReadWorkspaceQuery {
        owner,
        name,
        options: params.into_options(),
    };

    let response = state
        .read_handler
        .handle(&ctx, query)
        .await
        .map_err(|err| error_response(&err))?;

    Ok((response_headers(ctx.request_id()), Json(response.workspace)))
}

async fn request_context(state: &AppState, headers: &HeaderMap) -> Result<RequestContext, ApiError> {
    let request_id = extract_request_id(headers);
    let span = tracing::debug_span!("gateway.identity", request_id = %request_id);
    let user = extract_user(state, headers).instrument(span).await?;

    let mut ctx = RequestContext::new()
        .with_request_id(request_id)
        .with_timeout(Duration::from_millis(state.config.request_timeout_ms));
    if let Some(user) = user {
        ctx = ctx.with_user(user);
    }
    Ok(ctx)
}

fn response_headers(request_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    headers
}

fn observe<T>(route: &str, result: &Result<T, ApiError>, started: Instant) {
    let status = match result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    crate::metrics::observe_http_request(route, "GET", status.as_u16(), started.elapsed());
}

fn invalid_query() -> ApiError {
    json_error(
        StatusCode::BAD_REQUEST,
        "ERR_INVALID_PARAMS",
        "invalid query parameters",
        false,
    )
}

fn error_response(err: &WorkspaceError) -> ApiError {
    let (status, retryable) = match err {
        WorkspaceError::Unauthenticated => (StatusCode::UNAUTHORIZED, false),
        WorkspaceError::ReservedLabelKey { .. } | WorkspaceError::UnsupportedFieldSelector { .. } => {
            crate::metrics::inc_selector_rejection();
            (StatusCode::BAD_REQUEST, false)
        }
        WorkspaceError::NotFound { .. } => (StatusCode::NOT_FOUND, false),
        WorkspaceError::Store(StoreError::Timeout) => (StatusCode::GATEWAY_TIMEOUT, true),
        WorkspaceError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, true),
        WorkspaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, false),
    };

    let message = match err {
        WorkspaceError::Store(_) => "workspace store unavailable".to_string(),
        other => other.to_string(),
    };

    json_error(status, err.code(), message, retryable)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    retryable: bool,
}

fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    retryable: bool,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
            retryable,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_errors_map_to_status_and_code() {
        let cases = [
            (
                WorkspaceError::Unauthenticated,
                StatusCode::UNAUTHORIZED,
                "ERR_UNAUTHENTICATED",
            ),
            (
                WorkspaceError::ReservedLabelKey {
                    key: "workspaces.internal.example/owner-user".to_string(),
                },
                StatusCode::BAD_REQUEST,
                "ERR_INVALID_SELECTOR",
            ),
            (
                WorkspaceError::not_found("foo", "default"),
                StatusCode::NOT_FOUND,
                "ERR_NOT_FOUND",
            ),
            (
                WorkspaceError::Store(StoreError::Timeout),
                StatusCode::GATEWAY_TIMEOUT,
                "ERR_STORE_TIMEOUT",
            ),
            (
                WorkspaceError::Store(StoreError::BadStatus(502)),
                StatusCode::SERVICE_UNAVAILABLE,
                "ERR_STORE_UNAVAILABLE",
            ),
            (
                WorkspaceError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "ERR_INTERNAL",
            ),
        ];

        for (err, status, code) in cases {
            let (got_status, Json(body)) = error_response(&err);
            assert_eq!(got_status, status, "{:?}", err);
            assert_eq!(body.code, code);
        }
    }

    #[test]
    fn store_details_stay_out_of_error_bodies() {
        let (_, Json(body)) = error_response(&WorkspaceError::Store(StoreError::Unavailable(
            "dial tcp 10.0.0.7:9090: connection refused".to_string(),
        )));
        assert_eq!(body.message, "workspace store unavailable");
        assert!(body.retryable);
    }

    #[test]
    fn unauthenticated_message_is_fixed() {
        let (_, Json(body)) = error_response(&WorkspaceError::Unauthenticated);
        assert_eq!(body.message, "unauthenticated request");
        assert!(!body.retryable);
    }
}
