use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CibResult<T> = Result<T, CibError>;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CibError {
    #[error("{rc}: {name} {description}")]
    Session {
        rc: i32,
        name: String,
        description: String,
    },

    #[error("failed to decode CIB: {0}")]
    Decode(String),

    #[error("failed to apply diff: {0}")]
    Patch(String),

    #[error("not connected to the CIB")]
    NotConnected,

    #[error("invalid subscription state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("I/O error: {0}")]
    Io(String),
}

// Pacemaker-specific return codes live above the errno range.
pub const PCMK_OK: i32 = 0;
pub const PCMK_ERR_GENERIC: i32 = 201;
pub const PCMK_ERR_NO_QUORUM: i32 = 202;
pub const PCMK_ERR_SCHEMA_VALIDATION: i32 = 203;
pub const PCMK_ERR_TRANSFORM_FAILED: i32 = 204;
pub const PCMK_ERR_OLD_DATA: i32 = 205;
pub const PCMK_ERR_DIFF_FAILED: i32 = 206;
pub const PCMK_ERR_DIFF_RESYNC: i32 = 207;

const ENOENT: i32 = 2;
const ENXIO: i32 = 6;
const EACCES: i32 = 13;
const EINVAL: i32 = 22;
const ETIME: i32 = 62;
const ENOTSUP: i32 = 95;
const ENOTCONN: i32 = 107;
const ECONNREFUSED: i32 = 111;

/// Symbolic name and description for a cluster return code, sign ignored.
fn describe_rc(rc: i32) -> Option<(&'static str, &'static str)> {
    let described = match rc.checked_abs()? {
        PCMK_OK => ("pcmk_ok", "OK"),
        PCMK_ERR_GENERIC => ("pcmk_err_generic", "Generic Pacemaker error"),
        PCMK_ERR_NO_QUORUM => ("pcmk_err_no_quorum", "Operation requires quorum"),
        PCMK_ERR_SCHEMA_VALIDATION => (
            "pcmk_err_schema_validation",
            "Update does not conform to the configured schema",
        ),
        PCMK_ERR_TRANSFORM_FAILED => (
            "pcmk_err_transform_failed",
            "Schema transform failed",
        ),
        PCMK_ERR_OLD_DATA => (
            "pcmk_err_old_data",
            "Update was older than existing configuration",
        ),
        PCMK_ERR_DIFF_FAILED => (
            "pcmk_err_diff_failed",
            "Application of an update diff failed",
        ),
        PCMK_ERR_DIFF_RESYNC => (
            "pcmk_err_diff_resync",
            "Application of an update diff failed, requesting a full refresh",
        ),
        ENOENT => ("ENOENT", "No such file or directory"),
        ENXIO => ("ENXIO", "No such device or address"),
        EACCES => ("EACCES", "Permission denied"),
        EINVAL => ("EINVAL", "Invalid argument"),
        ETIME => ("ETIME", "Timer expired"),
        ENOTSUP => ("EOPNOTSUPP", "Operation not supported"),
        ENOTCONN => ("ENOTCONN", "Transport endpoint is not connected"),
        ECONNREFUSED => ("ECONNREFUSED", "Connection refused"),
        _ => return None,
    };
    Some(described)
}

impl CibError {
    /// Build a session error from a cluster return code. Unknown codes keep the
    /// number and carry empty name/description.
    pub fn from_rc(rc: i32) -> Self {
        let (name, description) = describe_rc(rc).unwrap_or(("", ""));
        CibError::Session {
            rc,
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    pub fn not_supported() -> Self {
        Self::from_rc(-ENOTSUP)
    }

    pub fn no_such_object() -> Self {
        Self::from_rc(-ENXIO)
    }

    pub fn not_connected_rc() -> Self {
        Self::from_rc(-ENOTCONN)
    }

    pub fn diff_failed() -> Self {
        Self::from_rc(-PCMK_ERR_DIFF_FAILED)
    }

    /// The cluster return code, if this is a session error.
    pub fn rc(&self) -> Option<i32> {
        match self {
            CibError::Session { rc, .. } => Some(*rc),
            _ => None,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, CibError::Decode(_))
    }
}

impl From<quick_xml::Error> for CibError {
    fn from(err: quick_xml::Error) -> Self {
        CibError::Decode(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for CibError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        CibError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for CibError {
    fn from(err: std::io::Error) -> Self {
        CibError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        ok = { 0, "pcmk_ok", "OK" },
        diff_failed = { -206, "pcmk_err_diff_failed", "Application of an update diff failed" },
        old_data = { -205, "pcmk_err_old_data", "Update was older than existing configuration" },
        not_connected = { -107, "ENOTCONN", "Transport endpoint is not connected" },
        no_such_object = { -6, "ENXIO", "No such device or address" },
    )]
    fn test_from_rc_known(rc: i32, name: &str, description: &str) {
        let err = CibError::from_rc(rc);
        assert_eq!(
            err,
            CibError::Session {
                rc,
                name: name.to_string(),
                description: description.to_string(),
            }
        );
        assert_eq!(err.rc(), Some(rc));
    }

    #[test]
    fn test_from_rc_unknown_keeps_code() {
        let err = CibError::from_rc(-4242);
        assert_eq!(err.to_string(), "-4242:  ");
    }

    #[test]
    fn test_session_display() {
        insta::assert_snapshot!(
            CibError::diff_failed().to_string(),
            @"-206: pcmk_err_diff_failed Application of an update diff failed"
        );
    }

    #[test]
    fn test_decode_is_distinct_from_session() {
        let err = CibError::Decode("unexpected end".into());
        assert!(err.is_decode());
        assert_eq!(err.rc(), None);
        assert!(!CibError::not_connected_rc().is_decode());
    }

    #[test]
    fn test_error_serialization() {
        let err = CibError::from_rc(-107);
        let value = serde_json::to_value(&err).unwrap();
        let back: CibError = serde_json::from_value(value).unwrap();
        assert_eq!(err, back);
    }
}
