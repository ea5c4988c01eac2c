//! The `status` section: node membership and resource operation history.

use super::attributes::attribute_set;
use super::{DecodeContext, Element, XmlStream};
use crate::error::CibResult;
use crate::types::{NodeState, ResourceState, ResourceStateOp, Status};

// Recorded by the cluster but not modeled.
const NODE_STATE_EXTRA: &[&str] = &["shutdown", "clear_shutdown", "ha", "uuid"];
const LRM_RSC_OP_EXTRA: &[&str] = &[
    "crm_feature_set",
    "crm-debug-origin",
    "op-force-restart",
    "op-restart-digest",
    "op-secure-params",
    "op-secure-digest",
    "last-failure",
    "rsc-provides",
];

pub(crate) fn status(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Status> {
    let mut status = Status::default();
    ctx.finish(&el);
    stream.children(&el, |stream, child| match child.name.as_str() {
        "node_state" => {
            status.node_states.extend(node_state(ctx, stream, child)?);
            Ok(())
        }
        _ => ctx.unknown_child(stream, "status", child),
    })?;
    Ok(status)
}

pub(crate) fn node_state(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    mut el: Element,
) -> CibResult<Option<NodeState>> {
    let id = ctx.take_required(&mut el, "id");
    let mut state = NodeState {
        uname: el.take("uname").unwrap_or_default(),
        in_ccm: el.take("in_ccm"),
        crmd: el.take("crmd"),
        crm_debug_origin: el.take("crm-debug-origin"),
        join: el.take("join"),
        expected: el.take("expected"),
        remote_node: el.take("remote_node"),
        ..Default::default()
    };
    el.ignore(NODE_STATE_EXTRA);
    ctx.finish(&el);

    stream.children(&el, |stream, child| match child.name.as_str() {
        "lrm" => lrm(ctx, stream, child, &mut state.resources),
        "transient_attributes" => stream.children(&child, |stream, set| {
            if set.name != "instance_attributes" {
                return ctx.unknown_child(stream, "transient_attributes", set);
            }
            if let Some(set) = attribute_set(ctx, stream, set)? {
                state.attributes.extend(set.values);
            }
            Ok(())
        }),
        _ => ctx.unknown_child(stream, "node_state", child),
    })?;

    Ok(id.map(|id| NodeState { id, ..state }))
}

fn lrm(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    mut el: Element,
    out: &mut Vec<ResourceState>,
) -> CibResult<()> {
    el.ignore(&["id"]);
    ctx.finish(&el);
    stream.children(&el, |stream, child| {
        if child.name != "lrm_resources" {
            return ctx.unknown_child(stream, "lrm", child);
        }
        stream.children(&child, |stream, resource| {
            if resource.name != "lrm_resource" {
                return ctx.unknown_child(stream, "lrm_resources", resource);
            }
            out.extend(lrm_resource(ctx, stream, resource)?);
            Ok(())
        })
    })
}

fn lrm_resource(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<ResourceState>> {
    let id = ctx.take_required(&mut el, "id");
    let mut state = ResourceState {
        resource_type: el.take("type"),
        class: el.take("class"),
        provider: el.take("provider"),
        container: el.take("container"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        if child.name != "lrm_rsc_op" {
            return ctx.unknown_child(stream, "lrm_resource", child);
        }
        state.ops.extend(lrm_rsc_op(ctx, stream, child)?);
        Ok(())
    })?;

    Ok(id.map(|id| ResourceState { id, ..state }))
}

fn lrm_rsc_op(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<ResourceStateOp>> {
    let id = ctx.take_required(&mut el, "id");
    let op = ResourceStateOp {
        operation: el.take("operation").unwrap_or_default(),
        operation_key: el.take("operation_key"),
        call_id: ctx.take_parsed(&mut el, "call-id").unwrap_or(-1),
        rc_code: ctx.take_parsed(&mut el, "rc-code").unwrap_or_default(),
        op_status: ctx.take_parsed(&mut el, "op-status").unwrap_or_default(),
        interval: el.take("interval"),
        last_run: el.take("last-run"),
        last_rc_change: el.take("last-rc-change"),
        exec_time: el.take("exec-time"),
        queue_time: el.take("queue-time"),
        on_node: el.take("on_node"),
        exit_reason: el.take("exit-reason"),
        transition_key: el.take("transition-key"),
        transition_magic: el.take("transition-magic"),
        op_digest: el.take("op-digest"),
        ..Default::default()
    };
    el.ignore(LRM_RSC_OP_EXTRA);
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(id.map(|id| ResourceStateOp { id, ..op }))
}
