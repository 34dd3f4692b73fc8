pub mod context;
pub mod error;
pub mod readclient;
pub mod workspace;

pub use context::RequestContext;
pub use error::{StoreError, WorkspaceError};
pub use readclient::{InternalWorkspaceClient, Page, ReadClient};
pub use workspace::{
    ListWorkspaceHandler, ListWorkspaceQuery, ListWorkspaceResponse, ReadWorkspaceHandler,
    ReadWorkspaceQuery, ReadWorkspaceResponse, WorkspaceLister, WorkspaceReader,
    label_workspace_owner,
};
