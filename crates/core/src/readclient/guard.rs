use workspaces_contracts::{LabelSelector, ListOptions, is_internal_key};

use crate::WorkspaceError;

pub const SUPPORTED_FIELD_SELECTORS: &[&str] = &["metadata.name", "metadata.namespace"];

/// Validates caller-supplied selectors before anything reaches the store.
///
/// Returns the label selector to filter with, or `None` when the caller did
/// not supply one.
pub fn guard_list_options(options: &ListOptions) -> Result<Option<&LabelSelector>, WorkspaceError> {
    if let Some(fields) = options.field_selector.as_ref()
        && let Some(unsupported) = fields
            .requirements()
            .iter()
            .find(|r| !SUPPORTED_FIELD_SELECTORS.contains(&r.field()))
    {
        return Err(WorkspaceError::UnsupportedFieldSelector {
            field: unsupported.field().to_string(),
        });
    }

    let Some(selector) = options.label_selector.as_ref() else {
        return Ok(None);
    };

    if let Some(reserved) = selector
        .requirements()
        .iter()
        .find(|r| is_internal_key(r.key()))
    {
        return Err(WorkspaceError::ReservedLabelKey {
            key: reserved.key().to_string(),
        });
    }

    Ok(Some(selector))
}

#[cfg(test)]
mod tests {
    use workspaces_contracts::FieldSelector;

    use super::*;

    fn with_labels(raw: &str) -> ListOptions {
        ListOptions::default().with_label_selector(LabelSelector::parse(raw).unwrap())
    }

    #[test]
    fn missing_selector_means_no_filtering() {
        assert_eq!(guard_list_options(&ListOptions::default()), Ok(None));
    }

    #[test]
    fn plain_selector_passes_through() {
        let options = with_labels("env=prod,tier in (web)");
        let selector = guard_list_options(&options).unwrap();
        assert_eq!(selector, options.label_selector.as_ref());
    }

    #[test]
    fn reserved_key_is_rejected_by_name() {
        let options = with_labels("env=prod,workspaces.internal.example/tenant=foo");
        let err = guard_list_options(&options).unwrap_err();
        assert_eq!(
            err,
            WorkspaceError::ReservedLabelKey {
                key: "workspaces.internal.example/tenant".to_string()
            }
        );
    }

    #[test]
    fn reserved_key_is_rejected_for_every_operator() {
        for raw in [
            "!workspaces.internal.example/owner-user",
            "workspaces.internal.example/owner-user",
            "workspaces.internal.example/owner-user notin (foo)",
            "workspaces.internal.example/owner-user!=foo",
        ] {
            assert!(
                matches!(
                    guard_list_options(&with_labels(raw)),
                    Err(WorkspaceError::ReservedLabelKey { .. })
                ),
                "expected `{}` to be rejected",
                raw
            );
        }
    }

    #[test]
    fn unsupported_field_selector_is_rejected() {
        let options = ListOptions::default()
            .with_field_selector(FieldSelector::parse("status.space.name=foo").unwrap());
        assert_eq!(
            guard_list_options(&options),
            Err(WorkspaceError::UnsupportedFieldSelector {
                field: "status.space.name".to_string()
            })
        );

        let options = ListOptions::default()
            .with_field_selector(FieldSelector::parse("metadata.namespace=foo").unwrap());
        assert_eq!(guard_list_options(&options), Ok(None));
    }
}
