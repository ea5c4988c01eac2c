//! Fixed allowed-value tables for enumerated CIB attributes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, VariantNames};
use utoipa::ToSchema;

/// `on-fail` of an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OnFail {
    Ignore,
    Block,
    Stop,
    Restart,
    Standby,
    Fence,
    RestartContainer,
    Demote,
}

/// `requires` of an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Requires {
    Nothing,
    Quorum,
    Fencing,
    Unfencing,
}

/// Resource role, used by operations, rules and constraints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
pub enum Role {
    Stopped,
    Started,
    Slave,
    Master,
    Unpromoted,
    Promoted,
}

/// How a rule combines its expressions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    And,
    Or,
}

/// Comparison of a node attribute `expression`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpressionOp {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Ne,
    Defined,
    NotDefined,
}

/// How the two sides of an `expression` are compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Number,
    Version,
}

/// Where the `value` of an `expression` comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Literal,
    Param,
    Meta,
}

/// Comparison of a `date_expression`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DateOp {
    Lt,
    Gt,
    InRange,
    DateSpec,
}

/// `kind` of an ordering constraint or resource set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
pub enum OrderKind {
    Optional,
    Mandatory,
    Serialize,
}

/// Action named by ordering constraints and resource sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceAction {
    Start,
    Stop,
    Promote,
    Demote,
}

/// `loss-policy` of a ticket constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LossPolicy {
    Stop,
    Demote,
    Fence,
    Freeze,
}

/// `resource-discovery` of a location constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceDiscovery {
    Always,
    Never,
    Exclusive,
}

/// `type` of a configured node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Normal,
    Member,
    Ping,
    Remote,
}

/// Kind of an ACL permission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, VariantNames, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AclKind {
    Read,
    Write,
    Deny,
}
