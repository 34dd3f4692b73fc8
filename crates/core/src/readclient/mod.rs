//! Read side of the workspace store.
//!
//! [`ReadClient`] serves the public workspace ports on top of an
//! [`InternalWorkspaceClient`], a primitive that already restricts results to
//! what the impersonated user may see. The read client never authorizes on
//! its own: it only guards the query surface, filters, and translates the
//! internal representation into the public one.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use workspaces_contracts::{GetOptions, InternalWorkspace, InternalWorkspaceList};

use crate::{RequestContext, StoreError};

mod guard;
mod list;
mod mapper;
mod read;

pub use self::guard::{SUPPORTED_FIELD_SELECTORS, guard_list_options};
pub use self::mapper::{MappingError, internal_list_to_workspace_list, internal_to_workspace};

/// Pagination passed through to the store untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub continue_token: Option<String>,
}

/// Per-user enumeration and point-read over internal workspaces.
#[async_trait]
pub trait InternalWorkspaceClient: Send + Sync {
    async fn list_as_user(
        &self,
        ctx: &RequestContext,
        user: &str,
        page: &Page,
    ) -> Result<InternalWorkspaceList, StoreError>;

    async fn get_as_user(
        &self,
        ctx: &RequestContext,
        user: &str,
        owner: &str,
        name: &str,
        options: &GetOptions,
    ) -> Result<InternalWorkspace, StoreError>;
}

#[derive(Clone)]
pub struct ReadClient {
    internal: Arc<dyn InternalWorkspaceClient>,
}

impl ReadClient {
    pub fn new(internal: Arc<dyn InternalWorkspaceClient>) -> Self {
        Self { internal }
    }
}

async fn within_deadline<T, F>(ctx: &RequestContext, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| StoreError::Timeout)?,
        None => fut.await,
    }
}
