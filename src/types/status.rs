//! The live `status` section: per-node membership and resource operation history.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::attributes::Nvpair;
use super::magic::{TransitionKey, TransitionMagic};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Status {
    #[serde(default)]
    pub node_states: Vec<NodeState>,
}

impl Status {
    pub fn node_state(&self, uname: &str) -> Option<&NodeState> {
        self.node_states.iter().find(|state| state.uname == uname)
    }

    pub fn resource_state(&self, uname: &str, resource_id: &str) -> Option<&ResourceState> {
        self.node_state(uname)?.resource(resource_id)
    }
}

/// A `node_state` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeState {
    pub id: String,
    pub uname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_ccm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crm_debug_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_node: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
    /// Transient node attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Nvpair>,
}

impl NodeState {
    /// Cluster membership. Newer clusters write a timestamp instead of `true`.
    pub fn in_ccm(&self) -> bool {
        self.in_ccm.as_deref().is_some_and(membership_flag)
    }

    /// Controller membership: `online`, `true` or a non-zero timestamp.
    pub fn crmd_online(&self) -> bool {
        self.crmd
            .as_deref()
            .is_some_and(|value| value == "online" || membership_flag(value))
    }

    pub fn is_member(&self) -> bool {
        self.join.as_deref() == Some("member")
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|resource| resource.id == id)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|pair| pair.name == name)
            .and_then(|pair| pair.value.as_deref())
    }
}

fn membership_flag(value: &str) -> bool {
    match value {
        "true" | "yes" | "on" | "1" => true,
        other => other.parse::<u64>().is_ok_and(|stamp| stamp > 0),
    }
}

/// An `lrm_resource`: the operation history of one resource on one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ResourceState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// History in document order.
    #[serde(default)]
    pub ops: Vec<ResourceStateOp>,
}

impl ResourceState {
    /// The most recent operation by call id. Pending operations (`-1`) sort last.
    pub fn last_operation(&self) -> Option<&ResourceStateOp> {
        self.ops.iter().max_by_key(|op| match op.call_id {
            -1 => i64::MIN,
            id => id,
        })
    }

    pub fn operations(&self, name: &str) -> impl Iterator<Item = &ResourceStateOp> {
        self.ops.iter().filter(move |op| op.operation == name)
    }
}

/// An `lrm_rsc_op` history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ResourceStateOp {
    pub id: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_key: Option<String>,
    pub call_id: i64,
    pub rc_code: i32,
    #[serde(default)]
    pub op_status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rc_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_magic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_digest: Option<String>,
}

impl ResourceStateOp {
    pub fn transition_magic(&self) -> Option<TransitionMagic> {
        self.transition_magic.as_deref()?.parse().ok()
    }

    pub fn transition_key(&self) -> Option<TransitionKey> {
        self.transition_key.as_deref()?.parse().ok()
    }

    /// True if the operation returned what the transition expected.
    pub fn succeeded(&self) -> bool {
        match self.transition_key() {
            Some(key) => key.target_rc == self.rc_code && self.op_status == 0,
            None => self.rc_code == 0 && self.op_status == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn op(call_id: i64, operation: &str) -> ResourceStateOp {
        ResourceStateOp {
            id: format!("rsc_{operation}_{call_id}"),
            operation: operation.to_string(),
            call_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_last_operation_by_call_id() {
        let state = ResourceState {
            id: "vip".into(),
            ops: vec![op(12, "monitor"), op(30, "start"), op(-1, "stop")],
            ..Default::default()
        };
        assert_eq!(state.last_operation().map(|o| o.call_id), Some(30));
        assert_eq!(state.operations("monitor").count(), 1);
    }

    #[parameterized(
        legacy_true = { Some("true"), true },
        legacy_false = { Some("false"), false },
        timestamp = { Some("1700000000"), true },
        zero = { Some("0"), false },
        missing = { None, false },
    )]
    fn test_in_ccm(value: Option<&str>, expected: bool) {
        let state = NodeState {
            in_ccm: value.map(str::to_string),
            ..Default::default()
        };
        assert_eq!(state.in_ccm(), expected);
    }

    #[test]
    fn test_succeeded_uses_target_rc() {
        let mut check = op(5, "monitor");
        check.rc_code = 7;
        check.transition_key = Some("3:0:7:0d5bb8a5-3c5d-4a4f-9e6c-2b5dbb7e2a10".into());
        assert!(check.succeeded());

        check.rc_code = 1;
        assert!(!check.succeeded());
    }
}
