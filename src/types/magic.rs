//! Packed transition identifiers recorded on status operations.
//!
//! A transition key is `action_id:transition_id:target_rc:uuid`; the transition
//! magic prefixes it with the outcome, `op_status:op_rc;<transition key>`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CibError;

static TRANSITION_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+):(-?\d+):(-?\d+):(\S+)$").expect("static transition key pattern")
});

static TRANSITION_MAGIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+):(-?\d+);(.+)$").expect("static transition magic pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct TransitionKey {
    pub action_id: i32,
    pub transition_id: i32,
    pub target_rc: i32,
    /// UUID of the controller that scheduled the transition.
    pub uuid: String,
}

impl FromStr for TransitionKey {
    type Err = CibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TRANSITION_KEY
            .captures(s.trim())
            .ok_or_else(|| CibError::Decode(format!("invalid transition key '{s}'")))?;
        Ok(Self {
            action_id: int_field(&caps[1], s)?,
            transition_id: int_field(&caps[2], s)?,
            target_rc: int_field(&caps[3], s)?,
            uuid: caps[4].to_string(),
        })
    }
}

impl Display for TransitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}:{}:{}:{}",
            self.action_id, self.transition_id, self.target_rc, self.uuid
        )
    }
}

/// Decoded `transition-magic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct TransitionMagic {
    pub transition_id: i32,
    pub action_id: i32,
    pub op_status: i32,
    pub op_rc: i32,
    pub target_rc: i32,
    pub uuid: String,
}

impl TransitionMagic {
    pub fn key(&self) -> TransitionKey {
        TransitionKey {
            action_id: self.action_id,
            transition_id: self.transition_id,
            target_rc: self.target_rc,
            uuid: self.uuid.clone(),
        }
    }

    /// Whether the operation completed with the return code the transition expected.
    pub fn is_expected(&self) -> bool {
        self.op_status == 0 && self.op_rc == self.target_rc
    }
}

impl FromStr for TransitionMagic {
    type Err = CibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TRANSITION_MAGIC
            .captures(s.trim())
            .ok_or_else(|| CibError::Decode(format!("invalid transition magic '{s}'")))?;
        let key: TransitionKey = caps[3].parse()?;
        Ok(Self {
            transition_id: key.transition_id,
            action_id: key.action_id,
            op_status: int_field(&caps[1], s)?,
            op_rc: int_field(&caps[2], s)?,
            target_rc: key.target_rc,
            uuid: key.uuid,
        })
    }
}

impl Display for TransitionMagic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{};{}", self.op_status, self.op_rc, self.key())
    }
}

fn int_field(raw: &str, whole: &str) -> Result<i32, CibError> {
    raw.parse()
        .map_err(|_| CibError::Decode(format!("number out of range in '{whole}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    const UUID: &str = "6f2b1a50-2d5c-4c8e-9f43-0b1c1de3a8a7";

    #[test]
    fn test_decode_magic() {
        let magic: TransitionMagic = format!("0:7;12:3:7:{UUID}").parse().unwrap();
        assert_eq!(
            magic,
            TransitionMagic {
                transition_id: 3,
                action_id: 12,
                op_status: 0,
                op_rc: 7,
                target_rc: 7,
                uuid: UUID.to_string(),
            }
        );
        assert!(magic.is_expected());
        assert_eq!(magic.to_string(), format!("0:7;12:3:7:{UUID}"));
    }

    #[test]
    fn test_decode_key() {
        let key: TransitionKey = format!("4:17:0:{UUID}").parse().unwrap();
        assert_eq!(key.action_id, 4);
        assert_eq!(key.transition_id, 17);
        assert_eq!(key.target_rc, 0);
        assert_eq!(key.uuid, UUID);
    }

    #[test]
    fn test_pending_magic() {
        let magic: TransitionMagic = format!("-1:193;4:17:0:{UUID}").parse().unwrap();
        assert_eq!(magic.op_status, -1);
        assert_eq!(magic.op_rc, 193);
        assert!(!magic.is_expected());
    }

    #[parameterized(
        empty = { "" },
        missing_key = { "0:0" },
        short_key = { "0:0;1:2" },
        not_numbers = { "a:b;1:2:3:uuid" },
        overflow = { "0:99999999999;1:2:3:uuid" },
    )]
    fn test_invalid_magic(raw: &str) {
        assert!(raw.parse::<TransitionMagic>().is_err());
    }
}
