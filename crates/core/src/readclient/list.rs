use std::collections::BTreeMap;

use async_trait::async_trait;
use workspaces_contracts::{
    FieldSelector, InternalWorkspaceList, LabelSelector, ListOptions, Workspace, WorkspaceList,
};

use super::{Page, ReadClient, guard_list_options, internal_list_to_workspace_list, within_deadline};
use crate::workspace::WorkspaceLister;
use crate::{RequestContext, WorkspaceError};

#[async_trait]
impl WorkspaceLister for ReadClient {
    async fn list_user_workspaces(
        &self,
        ctx: &RequestContext,
        user: &str,
        options: ListOptions,
    ) -> Result<WorkspaceList, WorkspaceError> {
        let selector = guard_list_options(&options).inspect_err(|err| {
            tracing::warn!(
                request_id = %ctx.request_id(),
                user = %user,
                error = %err,
                "rejected list selector"
            );
        })?;

        let page = Page {
            limit: options.limit,
            continue_token: options.continue_token.clone(),
        };

        let internal = within_deadline(ctx, self.internal.list_as_user(ctx, user, &page))
            .await
            .map_err(|err| {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    user = %user,
                    error = %err,
                    "store list failed"
                );
                list_failed(user)
            })?;

        let filtered = filter_by_labels(internal, selector);

        let mut workspaces = internal_list_to_workspace_list(&filtered).map_err(|err| {
            tracing::error!(
                request_id = %ctx.request_id(),
                user = %user,
                error = %err,
                "internal workspace mapping failed"
            );
            list_failed(user)
        })?;

        if let Some(fields) = options.field_selector.as_ref() {
            workspaces.items.retain(|w| matches_fields(fields, w));
        }

        Ok(workspaces)
    }
}

fn list_failed(user: &str) -> WorkspaceError {
    WorkspaceError::internal(format!(
        "error retrieving the list of workspaces for user {}",
        user
    ))
}

fn filter_by_labels(
    mut list: InternalWorkspaceList,
    selector: Option<&LabelSelector>,
) -> InternalWorkspaceList {
    list.items
        .retain(|w| matches_selector(selector, w.labels()));
    list
}

// An entity without labels is retained whatever the selector says.
fn matches_selector(
    selector: Option<&LabelSelector>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    match (selector, labels) {
        (None, _) | (_, None) => true,
        (Some(selector), Some(labels)) => selector.matches(labels),
    }
}

fn matches_fields(fields: &FieldSelector, workspace: &Workspace) -> bool {
    fields.matches(|field| match field {
        "metadata.name" => Some(workspace.metadata.name.as_str()),
        "metadata.namespace" => Some(workspace.metadata.namespace.as_str()),
        _ => None,
    })
}
