//! Placement and ordering constraints from the `constraints` section.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumDiscriminants};
use utoipa::ToSchema;

use super::enums::{LossPolicy, OrderKind, ResourceAction, ResourceDiscovery, Role};
use super::lenient::Lenient;
use super::rule::Rule;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, EnumDiscriminants)]
#[serde(rename_all = "snake_case")]
#[strum_discriminants(name(ConstraintKind), derive(AsRefStr, StrumDisplay, Hash))]
#[strum_discriminants(strum(serialize_all = "snake_case"))]
pub enum Constraint {
    Location(Location),
    Colocation(Colocation),
    Order(Order),
    Ticket(Ticket),
}

impl Constraint {
    pub fn id(&self) -> &str {
        match self {
            Constraint::Location(c) => &c.id,
            Constraint::Colocation(c) => &c.id,
            Constraint::Order(c) => &c.id,
            Constraint::Ticket(c) => &c.id,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        ConstraintKind::from(self)
    }

    pub fn resource_sets(&self) -> &[ResourceSet] {
        match self {
            Constraint::Location(c) => &c.resource_sets,
            Constraint::Colocation(c) => &c.resource_sets,
            Constraint::Order(c) => &c.resource_sets,
            Constraint::Ticket(c) => &c.resource_sets,
        }
    }

    /// Resources named directly, followed by those named through resource sets.
    pub fn resources(&self) -> Vec<&str> {
        let direct: Vec<Option<&str>> = match self {
            Constraint::Location(c) => vec![c.rsc.as_deref()],
            Constraint::Colocation(c) => vec![c.rsc.as_deref(), c.with_rsc.as_deref()],
            Constraint::Order(c) => vec![c.first.as_deref(), c.then.as_deref()],
            Constraint::Ticket(c) => vec![c.rsc.as_deref()],
        };
        direct
            .into_iter()
            .flatten()
            .chain(
                self.resource_sets()
                    .iter()
                    .flat_map(|set| set.resources.iter().map(String::as_str)),
            )
            .collect()
    }

    pub fn references(&self, resource_id: &str) -> bool {
        self.resources().contains(&resource_id)
    }
}

/// An ordered list of resource references with its own sequencing attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ResourceSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_all: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Lenient<ResourceAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Lenient<OrderKind>>,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_discovery: Option<Lenient<ResourceDiscovery>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Colocation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_rsc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc_role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_rsc_role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_action: Option<Lenient<ResourceAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then_action: Option<Lenient<ResourceAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Lenient<OrderKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetrical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Ticket {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsc_role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_policy: Option<Lenient<LossPolicy>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_sets: Vec<ResourceSet>,
}
