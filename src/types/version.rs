use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CibError;

/// The `admin_epoch:epoch:num_updates` triple identifying a CIB revision.
///
/// Ordering compares the fields in that order, which is how the cluster
/// decides which of two documents is newer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct CibVersion {
    pub admin_epoch: i32,
    pub epoch: i32,
    pub num_updates: i32,
}

impl CibVersion {
    pub fn new(admin_epoch: i32, epoch: i32, num_updates: i32) -> Self {
        Self {
            admin_epoch,
            epoch,
            num_updates,
        }
    }

    /// Read the triple from element attributes. `num_updates` defaults to 0;
    /// the epochs are required.
    pub fn from_attributes<'a, I>(attributes: I) -> Result<Self, CibError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut admin_epoch = None;
        let mut epoch = None;
        let mut num_updates = None;
        for (name, value) in attributes {
            let slot = match name {
                "admin_epoch" => &mut admin_epoch,
                "epoch" => &mut epoch,
                "num_updates" => &mut num_updates,
                _ => continue,
            };
            let parsed = value.trim().parse::<i32>().map_err(|_| {
                CibError::Decode(format!("invalid {name} value '{value}'"))
            })?;
            *slot = Some(parsed);
        }
        match (admin_epoch, epoch) {
            (Some(admin_epoch), Some(epoch)) => {
                Ok(Self::new(admin_epoch, epoch, num_updates.unwrap_or(0)))
            }
            _ => Err(CibError::Decode(
                "missing admin_epoch or epoch attribute".to_string(),
            )),
        }
    }
}

impl Display for CibVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}:{}", self.admin_epoch, self.epoch, self.num_updates)
    }
}

impl FromStr for CibVersion {
    type Err = CibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [admin_epoch, epoch, num_updates] = parts[..] else {
            return Err(CibError::Decode(format!(
                "invalid CIB version '{s}' (expected admin_epoch:epoch:num_updates)"
            )));
        };
        let field = |raw: &str| {
            raw.parse::<i32>()
                .map_err(|_| CibError::Decode(format!("invalid CIB version '{s}'")))
        };
        Ok(Self::new(
            field(admin_epoch)?,
            field(epoch)?,
            field(num_updates)?,
        ))
    }
}
