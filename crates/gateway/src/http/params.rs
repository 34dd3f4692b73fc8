use axum::http::StatusCode;
use serde::Deserialize;
use workspaces_contracts::{FieldSelector, GetOptions, LabelSelector, ListOptions};

use super::{ApiError, json_error};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct ListParams {
    label_selector: Option<String>,
    field_selector: Option<String>,
    limit: Option<u32>,
    #[serde(rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct ReadParams {
    resource_version: Option<String>,
}

impl ListParams {
    pub(super) fn into_options(self) -> Result<ListOptions, ApiError> {
        let mut options = ListOptions::default();

        if let Some(raw) = nonempty(self.label_selector.as_deref()) {
            let selector = LabelSelector::parse(raw).map_err(|err| {
                crate::metrics::inc_selector_rejection();
                json_error(
                    StatusCode::BAD_REQUEST,
                    "ERR_INVALID_SELECTOR",
                    format!("invalid label selector: {}", err),
                    false,
                )
            })?;
            options = options.with_label_selector(selector);
        }

        if let Some(raw) = nonempty(self.field_selector.as_deref()) {
            let selector = FieldSelector::parse(raw).map_err(|err| {
                crate::metrics::inc_selector_rejection();
                json_error(
                    StatusCode::BAD_REQUEST,
                    "ERR_INVALID_SELECTOR",
                    format!("invalid field selector: {}", err),
                    false,
                )
            })?;
            options = options.with_field_selector(selector);
        }

        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            options = options.with_limit(limit);
        }

        if let Some(token) = nonempty(self.continue_token.as_deref()) {
            options = options.with_continue(token);
        }

        Ok(options)
    }
}

impl ReadParams {
    pub(super) fn into_options(self) -> GetOptions {
        GetOptions {
            resource_version: nonempty(self.resource_version.as_deref()).map(str::to_string),
        }
    }
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
