//! Enumerated attribute values that tolerate out-of-table input.
//!
//! The cluster accepts values newer than any table compiled into a client, so
//! an unrecognized value is kept verbatim instead of being rejected.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::openapi::schema::{ObjectBuilder, Schema, Type};
use utoipa::openapi::RefOr;
use utoipa::ToSchema;

/// A value from a fixed allowed-value table, or the raw string when it is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lenient<T> {
    Known(T),
    Other(String),
}

impl<T: FromStr> Lenient<T> {
    pub fn parse(raw: &str) -> Self {
        raw.parse::<T>()
            .map(Lenient::Known)
            .unwrap_or_else(|_| Lenient::Other(raw.to_string()))
    }
}

impl<T> Lenient<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Lenient::Known(value) => Some(value),
            Lenient::Other(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Lenient::Known(_))
    }
}

impl<T: AsRef<str>> Lenient<T> {
    pub fn as_str(&self) -> &str {
        match self {
            Lenient::Known(value) => value.as_ref(),
            Lenient::Other(raw) => raw,
        }
    }
}

impl<T: AsRef<str>> Display for Lenient<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl<T: AsRef<str>> Serialize for Lenient<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, T: FromStr> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Lenient::parse(&raw))
    }
}

/// Documented as a plain string; the table is advisory.
impl<T> utoipa::__dev::ComposeSchema for Lenient<T> {
    fn compose(_: Vec<RefOr<Schema>>) -> RefOr<Schema> {
        ObjectBuilder::new().schema_type(Type::String).into()
    }
}

impl<T> ToSchema for Lenient<T> {}
