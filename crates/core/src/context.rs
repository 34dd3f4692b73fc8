use std::time::Duration;

use tokio::time::Instant;

/// Request-scoped values handed from the transport to the handlers.
///
/// The authenticated user is only ever read through [`RequestContext::user`];
/// a context without one is an unauthenticated request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<String>,
    request_id: Option<String>,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn user(&self) -> Option<&str> {
        self.user
            .as_deref()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("")
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
