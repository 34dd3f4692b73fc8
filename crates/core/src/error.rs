/// Failures reported by the per-user store primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    Forbidden,
    Timeout,
    Unavailable(String),
    BadStatus(u16),
    InvalidResponse,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "store object not found"),
            StoreError::Forbidden => write!(f, "store denied access"),
            StoreError::Timeout => write!(f, "store request timed out"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {}", reason),
            StoreError::BadStatus(status) => write!(f, "store returned status {}", status),
            StoreError::InvalidResponse => write!(f, "store returned an invalid response"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    Unauthenticated,
    ReservedLabelKey { key: String },
    UnsupportedFieldSelector { field: String },
    NotFound { owner: String, name: String },
    Store(StoreError),
    Internal { message: String },
}

impl WorkspaceError {
    pub fn internal(message: impl Into<String>) -> Self {
        WorkspaceError::Internal {
            message: message.into(),
        }
    }

    pub fn not_found(owner: &str, name: &str) -> Self {
        WorkspaceError::NotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WorkspaceError::Unauthenticated => "ERR_UNAUTHENTICATED",
            WorkspaceError::ReservedLabelKey { .. }
            | WorkspaceError::UnsupportedFieldSelector { .. } => "ERR_INVALID_SELECTOR",
            WorkspaceError::NotFound { .. } => "ERR_NOT_FOUND",
            WorkspaceError::Store(StoreError::Timeout) => "ERR_STORE_TIMEOUT",
            WorkspaceError::Store(_) => "ERR_STORE_UNAVAILABLE",
            WorkspaceError::Internal { .. } => "ERR_INTERNAL",
        }
    }
}

impl std::fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceError::Unauthenticated => write!(f, "unauthenticated request"),
            WorkspaceError::ReservedLabelKey { key } => {
                write!(f, "invalid label selector: key '{}' is reserved", key)
            }
            WorkspaceError::UnsupportedFieldSelector { field } => {
                write!(f, "invalid field selector: field '{}' is not supported", field)
            }
            WorkspaceError::NotFound { owner, name } => {
                write!(f, "workspace \"{}/{}\" not found", owner, name)
            }
            WorkspaceError::Store(err) => write!(f, "{}", err),
            WorkspaceError::Internal { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkspaceError::Store(err) => Some(err),
            _ => None,
        }
    }
}
