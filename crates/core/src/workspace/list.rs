use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use workspaces_contracts::{ListOptions, WorkspaceList};

use super::{WorkspaceLister, label_workspace_owner};
use crate::{RequestContext, WorkspaceError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListWorkspaceQuery {
    pub options: ListOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListWorkspaceResponse {
    pub workspaces: WorkspaceList,
}

#[derive(Clone)]
pub struct ListWorkspaceHandler {
    lister: Arc<dyn WorkspaceLister>,
}

impl ListWorkspaceHandler {
    pub fn new(lister: Arc<dyn WorkspaceLister>) -> Self {
        Self { lister }
    }

    pub async fn handle(
        &self,
        ctx: &RequestContext,
        query: ListWorkspaceQuery,
    ) -> Result<ListWorkspaceResponse, WorkspaceError> {
        let Some(user) = ctx.user() else {
            tracing::debug!(request_id = %ctx.request_id(), "rejecting unauthenticated list");
            return Err(WorkspaceError::Unauthenticated);
        };

        let span = tracing::info_span!(
            "workspace.list",
            request_id = %ctx.request_id(),
            user = %user,
            items = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let started = Instant::now();

        async {
            let result = self
                .lister
                .list_user_workspaces(ctx, user, query.options)
                .await;
            tracing::Span::current().record("latency_ms", started.elapsed().as_millis() as u64);

            let mut workspaces = match result {
                Ok(workspaces) => workspaces,
                Err(err) => {
                    tracing::Span::current().record("outcome", "error");
                    return Err(err);
                }
            };

            for workspace in workspaces.items.iter_mut() {
                label_workspace_owner(Some(workspace), user);
            }

            tracing::Span::current().record("items", workspaces.items.len() as u64);
            tracing::Span::current().record("outcome", "ok");
            Ok(ListWorkspaceResponse { workspaces })
        }
        .instrument(span)
        .await
    }
}
