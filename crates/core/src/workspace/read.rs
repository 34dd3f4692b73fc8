use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use workspaces_contracts::{GetOptions, Workspace};

use super::{WorkspaceReader, label_workspace_owner};
use crate::{RequestContext, WorkspaceError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadWorkspaceQuery {
    pub owner: String,
    pub name: String,
    pub options: GetOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWorkspaceResponse {
    pub workspace: Workspace,
}

#[derive(Clone)]
pub struct ReadWorkspaceHandler {
    reader: Arc<dyn WorkspaceReader>,
}

impl ReadWorkspaceHandler {
    pub fn new(reader: Arc<dyn WorkspaceReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        ctx: &RequestContext,
        query: ReadWorkspaceQuery,
    ) -> Result<ReadWorkspaceResponse, WorkspaceError> {
        let Some(user) = ctx.user() else {
            tracing::debug!(request_id = %ctx.request_id(), "rejecting unauthenticated read");
            return Err(WorkspaceError::Unauthenticated);
        };

        let span = tracing::info_span!(
            "workspace.read",
            request_id = %ctx.request_id(),
            user = %user,
            owner = %query.owner,
            name = %query.name,
            latency_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let started = Instant::now();

        async {
            let result = self
                .reader
                .read_user_workspace(ctx, user, &query.owner, &query.name, query.options)
                .await;
            tracing::Span::current().record("latency_ms", started.elapsed().as_millis() as u64);

            let mut workspace = match result {
                Ok(workspace) => workspace,
                Err(err) => {
                    tracing::Span::current().record("outcome", "error");
                    return Err(err);
                }
            };

            // ownership follows the fetched namespace, never the requested owner
            label_workspace_owner(Some(&mut workspace), user);

            tracing::Span::current().record("outcome", "ok");
            Ok(ReadWorkspaceResponse { workspace })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use workspaces_contracts::{LABEL_IS_OWNER, ObjectMeta};

    use super::*;

    type ReadCall = (String, String, String, GetOptions);

    /// Returns a workspace placed in `namespace` (or the requested owner).
    struct FakeReader {
        calls: Mutex<Vec<ReadCall>>,
        namespace: Option<String>,
        labels: Option<BTreeMap<String, String>>,
        error: Option<WorkspaceError>,
    }

    impl FakeReader {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                namespace: None,
                labels: None,
                error: None,
            }
        }

        fn calls(&self) -> Vec<ReadCall> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl WorkspaceReader for FakeReader {
        async fn read_user_workspace(
            &self,
            _ctx: &RequestContext,
            user: &str,
            owner: &str,
            name: &str,
            options: GetOptions,
        ) -> Result<Workspace, WorkspaceError> {
            self.calls.lock().expect("calls lock").push((
                user.to_string(),
                owner.to_string(),
                name.to_string(),
                options,
            ));

            if let Some(err) = self.error.clone() {
                return Err(err);
            }

            Ok(Workspace {
                metadata: ObjectMeta {
                    name: name.to_string(),
                    namespace: self.namespace.clone().unwrap_or_else(|| owner.to_string()),
                    labels: self.labels.clone(),
                    ..ObjectMeta::default()
                },
                ..Workspace::default()
            })
        }
    }

    fn query(owner: &str) -> ReadWorkspaceQuery {
        ReadWorkspaceQuery {
            owner: owner.to_string(),
            name: "default".to_string(),
            options: GetOptions::default(),
        }
    }

    fn authenticated() -> RequestContext {
        RequestContext::new().with_user("foo")
    }

    #[tokio::test]
    async fn rejects_unauthenticated_requests() {
        let reader = Arc::new(FakeReader::new());
        let handler = ReadWorkspaceHandler::new(reader.clone());

        let err = handler
            .handle(&RequestContext::new(), query("foo"))
            .await
            .unwrap_err();

        assert_eq!(err, WorkspaceError::Unauthenticated);
        assert!(reader.calls().is_empty());
    }

    #[tokio::test]
    async fn delegates_user_owner_name_and_options() {
        let reader = Arc::new(FakeReader::new());
        let handler = ReadWorkspaceHandler::new(reader.clone());
        let mut q = query("bar");
        q.options.resource_version = Some("42".to_string());

        handler
            .handle(&authenticated(), q)
            .await
            .expect("read should succeed");

        assert_eq!(
            reader.calls(),
            vec![(
                "foo".to_string(),
                "bar".to_string(),
                "default".to_string(),
                GetOptions {
                    resource_version: Some("42".to_string())
                },
            )]
        );
    }

    #[tokio::test]
    async fn owned_workspace_is_labelled_true() {
        let handler = ReadWorkspaceHandler::new(Arc::new(FakeReader::new()));

        let response = handler
            .handle(&authenticated(), query("foo"))
            .await
            .expect("read should succeed");

        assert_eq!(response.workspace.label(LABEL_IS_OWNER), Some("true"));
    }

    #[tokio::test]
    async fn existing_labels_are_preserved() {
        let mut reader = FakeReader::new();
        reader.labels = Some(BTreeMap::from([("foo".to_string(), "bar".to_string())]));
        let handler = ReadWorkspaceHandler::new(Arc::new(reader));

        let response = handler
            .handle(&authenticated(), query("foo"))
            .await
            .expect("read should succeed");

        assert_eq!(response.workspace.label("foo"), Some("bar"));
        assert_eq!(response.workspace.label(LABEL_IS_OWNER), Some("true"));
    }

    #[tokio::test]
    async fn foreign_workspace_is_labelled_false() {
        let handler = ReadWorkspaceHandler::new(Arc::new(FakeReader::new()));

        let response = handler
            .handle(&authenticated(), query("bar"))
            .await
            .expect("read should succeed");

        assert_eq!(response.workspace.metadata.namespace, "bar");
        assert_eq!(response.workspace.label(LABEL_IS_OWNER), Some("false"));
    }

    #[tokio::test]
    async fn ownership_uses_fetched_namespace_not_requested_owner() {
        let mut reader = FakeReader::new();
        reader.namespace = Some("bar".to_string());
        let handler = ReadWorkspaceHandler::new(Arc::new(reader));

        let response = handler
            .handle(&authenticated(), query("foo"))
            .await
            .expect("read should succeed");

        assert_eq!(response.workspace.label(LABEL_IS_OWNER), Some("false"));
    }

    #[tokio::test]
    async fn reader_errors_are_forwarded_unchanged() {
        let mut reader = FakeReader::new();
        reader.error = Some(WorkspaceError::not_found("bar", "default"));
        let handler = ReadWorkspaceHandler::new(Arc::new(reader));

        let err = handler
            .handle(&authenticated(), query("bar"))
            .await
            .unwrap_err();

        assert_eq!(err, WorkspaceError::not_found("bar", "default"));
    }
}
