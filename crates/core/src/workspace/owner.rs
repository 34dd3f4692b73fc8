use std::collections::BTreeMap;

use workspaces_contracts::{LABEL_IS_OWNER, Workspace};

/// Sets the is-owner label on `workspace` for `user`. Absent workspaces are
/// left alone.
pub fn label_workspace_owner(workspace: Option<&mut Workspace>, user: &str) {
    let Some(workspace) = workspace else {
        return;
    };

    let value = if workspace.metadata.namespace == user {
        "true"
    } else {
        "false"
    };

    workspace
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(LABEL_IS_OWNER.to_string(), value.to_string());
}
