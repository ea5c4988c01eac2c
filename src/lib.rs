//! Client library for the Pacemaker Cluster Information Base (CIB).
//!
//! Decodes CIB XML into typed configuration and status, and keeps a decoded
//! copy current by applying the cluster's diff notifications.

pub use cache::DocumentCache;
pub use cib::Cib;
pub use config::{
    CibConnection, ClientConfig, ConnectionOptions, DEFAULT_CLIENT_NAME, DEFAULT_REMOTE_PORT,
    DEFAULT_REMOTE_USER, DecodeOptions,
};
pub use decode::{decode, decode_configuration, decode_configuration_with, decode_status};
pub use diff::{DiffSummary, extract_diff};
pub use error::{CibError, CibResult};
pub use session::{
    ClusterSession, FileSessionProvider, MemorySession, NotificationHandler, QueryRequest, RegistrationId,
    SessionProvider,
};
pub use subscription::{CibEvent, EventCallback, Subscription, SubscriptionState};

pub mod error;
pub mod types;

mod cache;
mod cib;
mod config;
mod decode;
mod diff;
mod session;
mod subscription;

#[cfg(test)]
mod tests;
