//! Resource definitions from the `resources` section.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumDiscriminants};
use utoipa::ToSchema;

use super::attributes::{AttributeSet, lookup};
use super::enums::{OnFail, Requires, Role};
use super::interval::parse_interval_ms;
use super::lenient::Lenient;

/// A resource, tagged by the element that defined it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, EnumDiscriminants)]
#[serde(rename_all = "snake_case")]
#[strum_discriminants(name(ResourceKind), derive(AsRefStr, StrumDisplay, Hash))]
#[strum_discriminants(strum(serialize_all = "snake_case"))]
pub enum Resource {
    Primitive(Primitive),
    Group(Group),
    Clone(CloneResource),
    Master(CloneResource),
    Template(Primitive),
}

impl Resource {
    pub fn id(&self) -> &str {
        match self {
            Resource::Primitive(p) | Resource::Template(p) => &p.id,
            Resource::Group(g) => &g.id,
            Resource::Clone(c) | Resource::Master(c) => &c.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from(self)
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Resource::Primitive(p) | Resource::Template(p) => p.description.as_deref(),
            Resource::Group(g) => g.description.as_deref(),
            Resource::Clone(c) | Resource::Master(c) => c.description.as_deref(),
        }
    }

    pub fn meta_attributes(&self) -> &[AttributeSet] {
        match self {
            Resource::Primitive(p) | Resource::Template(p) => &p.meta_attributes,
            Resource::Group(g) => &g.meta_attributes,
            Resource::Clone(c) | Resource::Master(c) => &c.meta_attributes,
        }
    }

    pub fn instance_attributes(&self) -> &[AttributeSet] {
        match self {
            Resource::Primitive(p) | Resource::Template(p) => &p.instance_attributes,
            Resource::Group(g) => &g.instance_attributes,
            Resource::Clone(c) | Resource::Master(c) => &c.instance_attributes,
        }
    }

    /// A meta attribute by name, e.g. `target-role`.
    pub fn meta(&self, name: &str) -> Option<&str> {
        lookup(self.meta_attributes(), name)
    }

    /// This resource and every resource nested inside it, depth first.
    pub fn walk(&self) -> Vec<&Resource> {
        let mut out = vec![self];
        match self {
            Resource::Clone(c) | Resource::Master(c) => {
                if let Some(child) = c.child.as_deref() {
                    out.extend(child.walk());
                }
            }
            Resource::Primitive(_) | Resource::Template(_) | Resource::Group(_) => {}
        }
        out
    }

    /// Find `id` in this resource or below it. Group children are primitives,
    /// so they are returned by reference to the primitive.
    pub fn find(&self, id: &str) -> Option<ResourceRef<'_>> {
        if self.id() == id {
            return Some(ResourceRef::Resource(self));
        }
        match self {
            Resource::Group(g) => g
                .children
                .iter()
                .find(|child| child.id == id)
                .map(ResourceRef::Primitive),
            Resource::Clone(c) | Resource::Master(c) => {
                c.child.as_deref().and_then(|child| child.find(id))
            }
            Resource::Primitive(_) | Resource::Template(_) => None,
        }
    }
}

/// Result of a resource lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    Resource(&'a Resource),
    Primitive(&'a Primitive),
}

impl ResourceRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Resource(r) => r.id(),
            ResourceRef::Primitive(p) => &p.id,
        }
    }
}

/// A single agent-backed resource, also the shape of a `template`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Primitive {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub agent_type: Option<String>,
    /// Name of the template this primitive is derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utilization: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

impl Primitive {
    /// Agent in `class:provider:type` form, e.g. `ocf:heartbeat:IPaddr2`.
    pub fn agent(&self) -> String {
        let class = self.class.as_deref().unwrap_or_default();
        let agent_type = self.agent_type.as_deref().unwrap_or_default();
        match self.provider.as_deref() {
            Some(provider) => format!("{class}:{provider}:{agent_type}"),
            None => format!("{class}:{agent_type}"),
        }
    }

    pub fn operation(&self, name: &str) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(move |op| op.name == name)
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.id, self.agent())
    }
}

/// An ordered group of primitives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
    #[serde(default)]
    pub children: Vec<Primitive>,
}

/// A `clone` or `master` wrapper around exactly one resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CloneResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub child: Option<Box<Resource>>,
}

/// An `op` entry of a primitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Operation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<Lenient<OnFail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Lenient<Requires>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lenient<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_pending: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
}

impl Operation {
    /// Interval in milliseconds; an absent interval is 0.
    pub fn interval_ms(&self) -> Option<u64> {
        match self.interval.as_deref() {
            Some(raw) => parse_interval_ms(raw),
            None => Some(0),
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout.as_deref().and_then(parse_interval_ms)
    }

    pub fn is_recurring(&self) -> bool {
        self.interval_ms().is_some_and(|ms| ms > 0)
    }
}
