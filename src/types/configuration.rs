//! The `configuration` subtree: cluster options, nodes, resources, constraints,
//! fencing topology, ACLs, tags and alerts.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::attributes::{AttributeSet, lookup};
use super::constraint::Constraint;
use super::enums::{AclKind, NodeType};
use super::lenient::Lenient;
use super::resource::{Resource, ResourceRef};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Configuration {
    #[serde(default)]
    pub crm_config: Vec<AttributeSet>,
    #[serde(default)]
    pub rsc_defaults: Vec<AttributeSet>,
    #[serde(default)]
    pub op_defaults: Vec<AttributeSet>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub fencing_topology: Vec<FencingLevel>,
    #[serde(default)]
    pub acls: Acls,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Configuration {
    /// A cluster option from `crm_config`, e.g. `stonith-enabled`.
    pub fn cluster_property(&self, name: &str) -> Option<&str> {
        lookup(&self.crm_config, name)
    }

    pub fn node(&self, uname: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.uname == uname)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Find a resource by id at any nesting level.
    pub fn resource(&self, id: &str) -> Option<ResourceRef<'_>> {
        self.resources.iter().find_map(|resource| resource.find(id))
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id() == id)
    }

    /// Constraints that name `resource_id` directly or through a resource set.
    pub fn constraints_for(&self, resource_id: &str) -> Vec<&Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.references(resource_id))
            .collect()
    }

    /// Find a defined (non-reference) attribute set by id anywhere in the
    /// configuration, for resolving `id-ref` sets.
    pub fn attribute_set(&self, id: &str) -> Option<&AttributeSet> {
        self.attribute_sets()
            .into_iter()
            .find(|set| set.id.as_deref() == Some(id))
    }

    fn attribute_sets(&self) -> Vec<&AttributeSet> {
        let mut sets: Vec<&AttributeSet> = Vec::new();
        sets.extend(self.crm_config.iter());
        sets.extend(self.rsc_defaults.iter());
        sets.extend(self.op_defaults.iter());
        for node in &self.nodes {
            sets.extend(node.instance_attributes.iter());
            sets.extend(node.utilization.iter());
        }
        for top in &self.resources {
            for resource in top.walk() {
                sets.extend(resource.instance_attributes().iter());
                sets.extend(resource.meta_attributes().iter());
                match resource {
                    Resource::Primitive(p) | Resource::Template(p) => {
                        sets.extend(p.utilization.iter());
                        for op in &p.operations {
                            sets.extend(op.instance_attributes.iter());
                            sets.extend(op.meta_attributes.iter());
                        }
                    }
                    Resource::Group(g) => {
                        for child in &g.children {
                            sets.extend(child.instance_attributes.iter());
                            sets.extend(child.meta_attributes.iter());
                            sets.extend(child.utilization.iter());
                        }
                    }
                    Resource::Clone(_) | Resource::Master(_) => {}
                }
            }
        }
        for alert in &self.alerts {
            sets.extend(alert.instance_attributes.iter());
            sets.extend(alert.meta_attributes.iter());
        }
        sets
    }
}

/// A configured cluster node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub uname: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub node_type: Option<Lenient<NodeType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utilization: Vec<AttributeSet>,
}

impl Node {
    /// Node attribute by name, e.g. `standby`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.instance_attributes, name)
    }

    /// The node type as written, `"normal"` when absent.
    pub fn type_name(&self) -> &str {
        self.node_type.as_ref().map_or("normal", Lenient::as_str)
    }
}

/// One `fencing-level` of the fencing topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FencingLevel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Fencing devices, split from the comma separated `devices` list.
    #[serde(default)]
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Acls {
    #[serde(default)]
    pub targets: Vec<AclTarget>,
    #[serde(default)]
    pub groups: Vec<AclTarget>,
    #[serde(default)]
    pub roles: Vec<AclRole>,
}

impl Acls {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.groups.is_empty() && self.roles.is_empty()
    }

    pub fn role(&self, id: &str) -> Option<&AclRole> {
        self.roles.iter().find(|role| role.id == id)
    }
}

/// An `acl_target` or `acl_group` and the roles it is granted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AclTarget {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AclRole {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<AclPermission>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AclPermission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Lenient<AclKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A `tag` grouping configuration objects by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Alert {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
    /// Event classes from `select`, e.g. `select_fencing` becomes `fencing`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<AlertRecipient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AlertRecipient {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_attributes: Vec<AttributeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_attributes: Vec<AttributeSet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Nvpair, Primitive};

    fn config() -> Configuration {
        Configuration {
            crm_config: vec![AttributeSet {
                id: Some("cib-bootstrap-options".into()),
                values: vec![Nvpair::new("stonith-enabled", "false")],
                ..Default::default()
            }],
            nodes: vec![Node {
                id: "xxx".into(),
                uname: "c001n01".into(),
                node_type: Some(Lenient::parse("normal")),
                ..Default::default()
            }],
            resources: vec![Resource::Primitive(Primitive {
                id: "vip".into(),
                meta_attributes: vec![AttributeSet {
                    id: Some("vip-meta".into()),
                    values: vec![Nvpair::new("target-role", "Started")],
                    ..Default::default()
                }],
                ..Default::default()
            })],
            ..Default::default()
        }
    }

    #[test]
    fn test_lookups() {
        let config = config();
        assert_eq!(config.cluster_property("stonith-enabled"), Some("false"));
        assert_eq!(config.node("c001n01").map(|n| n.id.as_str()), Some("xxx"));
        assert_eq!(config.node_by_id("xxx").map(Node::type_name), Some("normal"));
        assert!(config.resource("vip").is_some());
    }

    #[test]
    fn test_attribute_set_resolution() {
        let config = config();
        let set = config.attribute_set("vip-meta").unwrap();
        assert_eq!(set.get("target-role"), Some("Started"));
        assert!(config.attribute_set("nope").is_none());
    }

    #[test]
    fn test_node_type_defaults_to_normal() {
        let node = Node {
            id: "1".into(),
            uname: "n1".into(),
            ..Default::default()
        };
        assert_eq!(node.type_name(), "normal");
    }
}
