//! The cluster session seam.
//!
//! The native CIB transport is not part of this crate. Everything the client
//! needs from it goes through [`ClusterSession`], so the cache and subscription
//! logic run unchanged against [`MemorySession`] or a binding to the real
//! daemon.

mod memory;
mod xpath;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ConnectionOptions};
use crate::error::CibResult;

pub use memory::{FileSessionProvider, MemorySession};

/// An open connection to a CIB.
///
/// Queries block the calling thread until the session answers. Notifications
/// are delivered on whichever thread runs [`ClusterSession::run_event_loop`].
pub trait ClusterSession: Send + Sync {
    /// Synchronous query. Returns the selected XML verbatim.
    fn query(&self, request: &QueryRequest) -> CibResult<String>;

    /// Register for diff and destroy notifications.
    fn register_notifications(&self, handler: Arc<dyn NotificationHandler>) -> CibResult<RegistrationId>;

    fn unregister(&self, registration: RegistrationId) -> CibResult<()>;

    /// Apply a diff to `base`, returning the patched document.
    fn apply_patch(&self, base: &str, diff: &str) -> CibResult<String>;

    /// Deliver notifications until the session is closed.
    fn run_event_loop(&self) -> CibResult<()>;

    fn close(&self) -> CibResult<()>;

    fn is_connected(&self) -> bool;
}

/// Receives notifications from a [`ClusterSession`].
pub trait NotificationHandler: Send + Sync {
    /// A `cib_diff_notify` envelope.
    fn on_diff(&self, envelope: &str);

    /// The session went away.
    fn on_destroy(&self);
}

/// Opens sessions for the connection kinds it supports.
pub trait SessionProvider {
    fn open(&self, options: &ConnectionOptions, config: &ClientConfig) -> CibResult<Arc<dyn ClusterSession>>;
}

/// Handle for an active notification registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub u64);

impl Display for RegistrationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "registration-{}", self.0)
    }
}

/// A synchronous query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Section to select; `None` is the whole document.
    pub xpath: Option<String>,
    /// Answer from the local replica instead of the DC.
    pub scope_local: bool,
    /// Return only the selected element's own tag and attributes.
    pub no_children: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self::full()
    }
}

impl QueryRequest {
    pub fn full() -> Self {
        Self {
            xpath: None,
            scope_local: true,
            no_children: false,
        }
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Self {
            xpath: Some(path.into()),
            ..Self::full()
        }
    }

    pub fn without_children(mut self) -> Self {
        self.no_children = true;
        self
    }

    pub fn with_scope_local(mut self, scope_local: bool) -> Self {
        self.scope_local = scope_local;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_builders() {
        let full = QueryRequest::full();
        assert_eq!(full.xpath, None);
        assert!(full.scope_local);
        assert!(!full.no_children);

        let version = QueryRequest::xpath("/cib").without_children().with_scope_local(false);
        assert_eq!(version.xpath.as_deref(), Some("/cib"));
        assert!(version.no_children);
        assert!(!version.scope_local);
    }

    #[test]
    fn test_registration_display() {
        assert_eq!(RegistrationId(7).to_string(), "registration-7");
    }
}
