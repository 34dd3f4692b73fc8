use std::collections::BTreeMap;

use workspaces_contracts::{
    InternalWorkspace, InternalWorkspaceList, LABEL_INTERNAL_OWNER, ObjectMeta, SpaceInfo,
    UserInfoStatus, Workspace, WorkspaceList, WorkspaceSpec, WorkspaceStatus, api_version,
    is_internal_key,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    message: String,
}

impl MappingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MappingError {}

/// Projects an internal workspace onto its public form.
///
/// The public workspace is addressed by owner (as namespace) and display name;
/// the generated internal name and namespace, managed fields, identity
/// provider details, placement, and every key under the internal domain are
/// dropped.
pub fn internal_to_workspace(internal: &InternalWorkspace) -> Result<Workspace, MappingError> {
    let meta = &internal.metadata.meta;

    let owner = internal
        .labels()
        .and_then(|labels| labels.get(LABEL_INTERNAL_OWNER))
        .map(String::as_str)
        .or(internal.status.owner.username.as_deref())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| {
            MappingError::new(format!("internal workspace `{}` has no owner", meta.name))
        })?;

    let display_name = internal.spec.display_name.trim();
    if display_name.is_empty() {
        return Err(MappingError::new(format!(
            "internal workspace `{}` has no display name",
            meta.name
        )));
    }

    let email = internal.spec.owner.jwt_info.email.trim();

    Ok(Workspace {
        api_version: api_version(),
        kind: Workspace::KIND.to_string(),
        metadata: ObjectMeta {
            name: display_name.to_string(),
            namespace: owner.to_string(),
            uid: None,
            resource_version: meta.resource_version.clone(),
            generation: meta.generation,
            creation_timestamp: meta.creation_timestamp.clone(),
            labels: meta.labels.as_ref().map(strip_internal_keys),
            annotations: meta.annotations.as_ref().map(strip_internal_keys),
        },
        spec: WorkspaceSpec {
            visibility: internal.spec.visibility,
        },
        status: WorkspaceStatus {
            owner: (!email.is_empty()).then(|| UserInfoStatus {
                email: Some(email.to_string()),
            }),
            space: internal.status.space.as_ref().map(|space| SpaceInfo {
                name: space.name.clone(),
            }),
            conditions: internal.status.conditions.clone(),
        },
    })
}

pub fn internal_list_to_workspace_list(
    internal: &InternalWorkspaceList,
) -> Result<WorkspaceList, MappingError> {
    let items = internal
        .items
        .iter()
        .map(internal_to_workspace)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WorkspaceList {
        api_version: api_version(),
        kind: WorkspaceList::KIND.to_string(),
        metadata: internal.metadata.clone(),
        items,
    })
}

fn strip_internal_keys(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .filter(|(k, _)| !is_internal_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use workspaces_contracts::{Condition, WorkspaceVisibility};

    use super::*;
    use crate::readclient::testing::{internal_workspace, owned};

    #[test]
    fn maps_identity_and_projects_fields() {
        let mut internal = owned("foo", "default", &[("env", "prod")]);
        internal.spec.visibility = WorkspaceVisibility::Community;
        internal.status.conditions.push(Condition {
            condition_type: "Ready".to_string(),
            status: "True".to_string(),
            ..Condition::default()
        });

        let ws = internal_to_workspace(&internal).expect("mapping should succeed");

        assert_eq!(ws.api_version, "workspaces.example/v1alpha1");
        assert_eq!(ws.kind, "Workspace");
        assert_eq!(ws.metadata.name, "default");
        assert_eq!(ws.metadata.namespace, "foo");
        assert_eq!(ws.metadata.resource_version.as_deref(), Some("7"));
        assert_eq!(ws.spec.visibility, WorkspaceVisibility::Community);
        assert_eq!(
            ws.status.owner.and_then(|o| o.email).as_deref(),
            Some("foo@example.com")
        );
        assert_eq!(ws.status.space.map(|s| s.name).as_deref(), Some("foo-tenant"));
        assert_eq!(ws.status.conditions.len(), 1);
    }

    #[test]
    fn internal_only_data_never_survives() {
        let mut internal = owned("foo", "default", &[("env", "prod")]);
        internal.metadata.meta.annotations = Some(BTreeMap::from([
            (
                "workspaces.internal.example/last-sync".to_string(),
                "x".to_string(),
            ),
            ("note".to_string(), "hello".to_string()),
        ]));

        let ws = internal_to_workspace(&internal).expect("mapping should succeed");
        let json = serde_json::to_string(&ws).expect("workspace should encode");

        for leaked in [
            "workspaces.internal.example",
            "workspaces-system",
            "foo-default-x7k2p",
            "uid-foo-default",
            "sub-foo",
            "id-foo",
            "member-1",
            "managedFields",
            "workspaces-operator",
        ] {
            assert!(!json.contains(leaked), "`{}` leaked into {}", leaked, json);
        }
        assert_eq!(ws.label("env"), Some("prod"));
        assert_eq!(
            ws.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get("note"))
                .map(String::as_str),
            Some("hello")
        );
    }

    #[test]
    fn owner_falls_back_to_status_when_label_missing() {
        let internal = internal_workspace("bar", "default", None);
        let ws = internal_to_workspace(&internal).expect("mapping should succeed");
        assert_eq!(ws.metadata.namespace, "bar");
        assert_eq!(ws.metadata.labels, None);
    }

    #[test]
    fn missing_owner_or_display_name_fails() {
        let mut internal = internal_workspace("bar", "default", None);
        internal.status.owner.username = None;
        assert!(internal_to_workspace(&internal).is_err());

        let mut internal = owned("bar", "default", &[]);
        internal.spec.display_name = "  ".to_string();
        assert!(internal_to_workspace(&internal).is_err());
    }

    #[test]
    fn list_mapping_keeps_order_and_metadata() {
        let internal = InternalWorkspaceList {
            metadata: workspaces_contracts::ListMeta {
                resource_version: Some("100".to_string()),
                continue_token: Some("next".to_string()),
            },
            items: vec![owned("foo", "b", &[]), owned("bar", "a", &[])],
        };

        let list = internal_list_to_workspace_list(&internal).expect("mapping should succeed");
        assert_eq!(list.kind, "WorkspaceList");
        assert_eq!(list.metadata.continue_token.as_deref(), Some("next"));
        let names = list
            .items
            .iter()
            .map(|w| (w.metadata.namespace.as_str(), w.metadata.name.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("foo", "b"), ("bar", "a")]);
    }
}
