//! Typed model of the CIB.
//!
//! One file per entity family. Element and attribute names map to snake_case
//! fields; `type` attributes become `agent_type` / `node_type` / `resource_type`
//! and serialize back as `type`.

mod attributes;
mod configuration;
mod constraint;
mod document;
mod enums;
mod interval;
mod lenient;
mod magic;
mod resource;
mod rule;
mod status;
mod version;

pub use attributes::{AttributeSet, Nvpair, lookup};
pub use configuration::{
    AclPermission, AclRole, AclTarget, Acls, Alert, AlertRecipient, Configuration, FencingLevel,
    Node, Tag,
};
pub use constraint::{
    Colocation, Constraint, ConstraintKind, Location, Order, ResourceSet, Ticket,
};
pub use document::Document;
pub use enums::{
    AclKind, BooleanOp, DateOp, ExpressionOp, LossPolicy, NodeType, OnFail, OrderKind, Requires,
    ResourceAction, ResourceDiscovery, Role, ValueSource, ValueType,
};
pub use interval::parse_interval_ms;
pub use lenient::Lenient;
pub use magic::{TransitionKey, TransitionMagic};
pub use resource::{
    CloneResource, Group, Operation, Primitive, Resource, ResourceKind, ResourceRef,
};
pub use rule::{
    DateDuration, DateExpression, Expression, OpExpression, RscExpression, Rule, RuleExpression,
};
pub use status::{NodeState, ResourceState, ResourceStateOp, Status};
pub use version::CibVersion;
