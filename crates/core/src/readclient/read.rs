use async_trait::async_trait;
use workspaces_contracts::{GetOptions, Workspace};

use super::{ReadClient, internal_to_workspace, within_deadline};
use crate::workspace::WorkspaceReader;
use crate::{RequestContext, StoreError, WorkspaceError};

#[async_trait]
impl WorkspaceReader for ReadClient {
    async fn read_user_workspace(
        &self,
        ctx: &RequestContext,
        user: &str,
        owner: &str,
        name: &str,
        options: GetOptions,
    ) -> Result<Workspace, WorkspaceError> {
        let internal = within_deadline(
            ctx,
            self.internal.get_as_user(ctx, user, owner, name, &options),
        )
        .await
        .map_err(|err| match err {
            // invisible and absent must look the same to the caller
            StoreError::NotFound | StoreError::Forbidden => WorkspaceError::not_found(owner, name),
            other => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    user = %user,
                    error = %other,
                    "store read failed"
                );
                WorkspaceError::Store(other)
            }
        })?;

        internal_to_workspace(&internal).map_err(|err| {
            tracing::error!(
                request_id = %ctx.request_id(),
                user = %user,
                error = %err,
                "internal workspace mapping failed"
            );
            WorkspaceError::internal(format!(
                "error retrieving workspace {}/{} for user {}",
                owner, name, user
            ))
        })
    }
}
