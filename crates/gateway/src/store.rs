use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use workspaces_contracts::{GetOptions, InternalWorkspace, InternalWorkspaceList};
use workspaces_core::{InternalWorkspaceClient, Page, RequestContext, StoreError};

pub const IMPERSONATE_USER_HEADER: &str = "impersonate-user";
pub const REQUEST_ID_HEADER: &str = "x-workspaces-request-id";

/// HTTP client for the backing store's per-user endpoints.
///
/// Every call impersonates the requesting user; the store decides what that
/// user may see.
#[derive(Clone)]
pub struct HttpStoreClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpStoreClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| StoreError::Unavailable(format!("invalid store url: {}", err)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(
                "store url cannot be a base".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(Self { base_url, http })
    }

    pub async fn ready(&self) -> Result<(), StoreError> {
        let resp = self
            .http
            .get(self.url(&["healthz"]))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(StoreError::BadStatus(resp.status().as_u16()));
        }
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        user: &str,
        url: Url,
    ) -> Result<T, StoreError> {
        let mut req = self.http.get(url).header(IMPERSONATE_USER_HEADER, user);
        if !ctx.request_id().is_empty() {
            req = req.header(REQUEST_ID_HEADER, ctx.request_id());
        }

        let resp = req.send().await.map_err(transport_error)?;

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StoreError::NotFound),
            StatusCode::FORBIDDEN => return Err(StoreError::Forbidden),
            status => return Err(StoreError::BadStatus(status.as_u16())),
        }

        resp.json::<T>()
            .await
            .map_err(|_| StoreError::InvalidResponse)
    }
}

#[async_trait]
impl InternalWorkspaceClient for HttpStoreClient {
    async fn list_as_user(
        &self,
        ctx: &RequestContext,
        user: &str,
        page: &Page,
    ) -> Result<InternalWorkspaceList, StoreError> {
        let mut url = self.url(&["v1", "internalworkspaces"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = page.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(token) = page.continue_token.as_deref() {
                query.append_pair("continue", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        self.get_json(ctx, user, url).await
    }

    async fn get_as_user(
        &self,
        ctx: &RequestContext,
        user: &str,
        owner: &str,
        name: &str,
        options: &GetOptions,
    ) -> Result<InternalWorkspace, StoreError> {
        let mut url = self.url(&["v1", "internalworkspaces", owner, name]);
        if let Some(rv) = options.resource_version.as_deref() {
            url.query_pairs_mut().append_pair("resourceVersion", rv);
        }

        self.get_json(ctx, user, url).await
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpStoreClient {
        HttpStoreClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn urls_are_joined_under_the_base_path() {
        let store = client("http://store.local:9090/");
        assert_eq!(
            store.url(&["v1", "internalworkspaces"]).as_str(),
            "http://store.local:9090/v1/internalworkspaces"
        );

        let prefixed = client("http://store.local:9090/api");
        assert_eq!(
            prefixed.url(&["healthz"]).as_str(),
            "http://store.local:9090/api/healthz"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let store = client("http://store.local:9090");
        let url = store.url(&["v1", "internalworkspaces", "foo", "a/b c"]);
        assert_eq!(url.path(), "/v1/internalworkspaces/foo/a%2Fb%20c");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(HttpStoreClient::new("mailto:store@example.com", Duration::from_secs(1)).is_err());
        assert!(HttpStoreClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
