//! Client and decode configuration, and the ways a session can be opened.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub const DEFAULT_CLIENT_NAME: &str = "pacemaker-cib";
pub const DEFAULT_REMOTE_PORT: u16 = 3121;
pub const DEFAULT_REMOTE_USER: &str = "hacluster";

/// How the decoder treats content it does not model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Log unknown attributes and elements at `warn` rather than `debug`.
    pub warn_unknown: bool,
    /// Decode the configuration subtree together with the document instead of
    /// on first access.
    pub eager_configuration: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            warn_unknown: true,
            eager_configuration: false,
        }
    }
}

impl DecodeOptions {
    pub fn with_warn_unknown(mut self, warn: bool) -> Self {
        self.warn_unknown = warn;
        self
    }

    pub fn with_eager_configuration(mut self, eager: bool) -> Self {
        self.eager_configuration = eager;
        self
    }
}

/// Sign-on type requested from the cluster.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CibConnection {
    #[default]
    Query,
    Command,
}

/// Per-handle client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_name: String,
    pub connection: CibConnection,
    /// Answer queries from the local replica instead of the DC.
    pub scope_local: bool,
    pub decode: DecodeOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            connection: CibConnection::default(),
            scope_local: true,
            decode: DecodeOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            ..Default::default()
        }
    }

    pub fn with_connection(mut self, connection: CibConnection) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_scope_local(mut self, scope_local: bool) -> Self {
        self.scope_local = scope_local;
        self
    }

    pub fn with_decode(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }
}

/// Where the CIB comes from.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionOptions {
    /// The local cluster daemon.
    #[default]
    Local,
    /// A CIB saved to disk.
    File(PathBuf),
    /// A named shadow copy.
    Shadow(String),
    Remote {
        host: String,
        user: String,
        /// Never serialized.
        #[serde(default, skip_serializing)]
        password: String,
        port: u16,
        encrypted: bool,
    },
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionOptions::Local => f.write_str("Local"),
            ConnectionOptions::File(path) => f.debug_tuple("File").field(path).finish(),
            ConnectionOptions::Shadow(name) => f.debug_tuple("Shadow").field(name).finish(),
            ConnectionOptions::Remote {
                host,
                user,
                port,
                encrypted,
                ..
            } => f
                .debug_struct("Remote")
                .field("host", host)
                .field("user", user)
                .field("password", &"<redacted>")
                .field("port", port)
                .field("encrypted", encrypted)
                .finish(),
        }
    }
}

impl ConnectionOptions {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        ConnectionOptions::File(path.into())
    }

    pub fn from_shadow(name: impl Into<String>) -> Self {
        ConnectionOptions::Shadow(name.into())
    }

    /// Remote connection with the default port and user. Use
    /// [`ConnectionOptions::with_port`] and [`ConnectionOptions::with_user`] to override.
    pub fn from_remote(host: impl Into<String>, password: impl Into<String>, encrypted: bool) -> Self {
        ConnectionOptions::Remote {
            host: host.into(),
            user: DEFAULT_REMOTE_USER.to_string(),
            password: password.into(),
            port: DEFAULT_REMOTE_PORT,
            encrypted,
        }
    }

    pub fn with_port(mut self, new_port: u16) -> Self {
        if let ConnectionOptions::Remote { port, .. } = &mut self {
            *port = new_port;
        }
        self
    }

    pub fn with_user(mut self, new_user: impl Into<String>) -> Self {
        if let ConnectionOptions::Remote { user, .. } = &mut self {
            *user = new_user.into();
        }
        self
    }

    /// Short name for logging; never includes credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionOptions::Local => "local",
            ConnectionOptions::File(_) => "file",
            ConnectionOptions::Shadow(_) => "shadow",
            ConnectionOptions::Remote { .. } => "remote",
        }
    }
}
