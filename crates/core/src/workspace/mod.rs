use async_trait::async_trait;
use workspaces_contracts::{GetOptions, ListOptions, Workspace, WorkspaceList};

use crate::{RequestContext, WorkspaceError};

mod list;
mod owner;
mod read;

pub use self::list::{ListWorkspaceHandler, ListWorkspaceQuery, ListWorkspaceResponse};
pub use self::owner::label_workspace_owner;
pub use self::read::{ReadWorkspaceHandler, ReadWorkspaceQuery, ReadWorkspaceResponse};

/// Lists the workspaces a user may see.
#[async_trait]
pub trait WorkspaceLister: Send + Sync {
    async fn list_user_workspaces(
        &self,
        ctx: &RequestContext,
        user: &str,
        options: ListOptions,
    ) -> Result<WorkspaceList, WorkspaceError>;
}

/// Reads a single workspace addressed by owner and name.
///
/// A workspace that exists but is not visible to `user` must produce the same
/// [`WorkspaceError::NotFound`] as one that does not exist at all.
#[async_trait]
pub trait WorkspaceReader: Send + Sync {
    async fn read_user_workspace(
        &self,
        ctx: &RequestContext,
        user: &str,
        owner: &str,
        name: &str,
        options: GetOptions,
    ) -> Result<Workspace, WorkspaceError>;
}
