//! The `configuration` subtree, section by section.

use super::attributes::attribute_set;
use super::constraints::constraint;
use super::resources::resource;
use super::{DecodeContext, Element, XmlStream, non_empty};
use crate::error::CibResult;
use crate::types::{
    AclPermission, AclRole, AclTarget, Alert, AlertRecipient, AttributeSet, Configuration,
    FencingLevel, Node, Tag,
};

const SECTIONS: &[&str] = &[
    "crm_config",
    "rsc_defaults",
    "op_defaults",
    "nodes",
    "resources",
    "constraints",
    "fencing-topology",
    "acls",
    "tags",
    "alerts",
];

pub(crate) fn is_section(name: &str) -> bool {
    SECTIONS.contains(&name)
}

pub(crate) fn configuration(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    el: Element,
    config: &mut Configuration,
) -> CibResult<()> {
    ctx.finish(&el);
    stream.children(&el, |stream, child| {
        if is_section(&child.name) {
            section(ctx, stream, child, config)
        } else {
            ctx.unknown_child(stream, "configuration", child)
        }
    })
}

/// Decode one top-level section into `config`.
pub(crate) fn section(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    el: Element,
    config: &mut Configuration,
) -> CibResult<()> {
    ctx.finish(&el);
    let name = el.name.clone();
    stream.children(&el, |stream, child| {
        match (name.as_str(), child.name.as_str()) {
            ("crm_config", "cluster_property_set") => config.crm_config.extend(attribute_set(ctx, stream, child)?),
            ("rsc_defaults", "meta_attributes") => config.rsc_defaults.extend(attribute_set(ctx, stream, child)?),
            ("op_defaults", "meta_attributes") => config.op_defaults.extend(attribute_set(ctx, stream, child)?),
            ("nodes", "node") => config.nodes.extend(node(ctx, stream, child)?),
            ("resources", _) => config.resources.extend(resource(ctx, stream, "resources", child)?),
            ("constraints", _) => config.constraints.extend(constraint(ctx, stream, child)?),
            ("fencing-topology", "fencing-level") => config.fencing_topology.extend(fencing_level(ctx, stream, child)?),
            ("acls", "acl_target" | "acl_user") => config.acls.targets.extend(acl_target(ctx, stream, child)?),
            ("acls", "acl_group") => config.acls.groups.extend(acl_target(ctx, stream, child)?),
            ("acls", "acl_role") => config.acls.roles.extend(acl_role(ctx, stream, child)?),
            ("tags", "tag") => config.tags.extend(tag(ctx, stream, child)?),
            ("alerts", "alert") => config.alerts.extend(alert(ctx, stream, child)?),
            _ => ctx.unknown_child(stream, &name, child)?,
        }
        Ok(())
    })
}

/// `instance_attributes` / `meta_attributes` children shared by alerts and recipients.
fn nested_attribute_set(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    parent: &str,
    child: Element,
    instance: &mut Vec<AttributeSet>,
    meta: &mut Vec<AttributeSet>,
) -> CibResult<()> {
    match child.name.as_str() {
        "instance_attributes" => instance.extend(attribute_set(ctx, stream, child)?),
        "meta_attributes" => meta.extend(attribute_set(ctx, stream, child)?),
        _ => ctx.unknown_child(stream, parent, child)?,
    }
    Ok(())
}

fn node(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Node>> {
    let id = ctx.take_required(&mut el, "id");
    let uname = ctx.take_required(&mut el, "uname");
    let mut node = Node {
        node_type: ctx.take_lenient(&mut el, "type"),
        description: el.take("description"),
        score: el.take("score"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "instance_attributes" => node.instance_attributes.extend(attribute_set(ctx, stream, child)?),
            "utilization" => node.utilization.extend(attribute_set(ctx, stream, child)?),
            _ => ctx.unknown_child(stream, "node", child)?,
        }
        Ok(())
    })?;

    Ok(match (id, uname) {
        (Some(id), Some(uname)) => Some(Node { id, uname, ..node }),
        _ => None,
    })
}

fn fencing_level(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<FencingLevel>> {
    let id = ctx.take_required(&mut el, "id");
    let level = FencingLevel {
        target: el.take("target"),
        target_pattern: el.take("target-pattern"),
        target_attribute: el.take("target-attribute"),
        target_value: el.take("target-value"),
        index: ctx.take_parsed(&mut el, "index"),
        devices: el
            .take("devices")
            .map(|devices| {
                devices
                    .split(',')
                    .map(str::trim)
                    .filter(|device| !device.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        ..Default::default()
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(id.map(|id| FencingLevel { id, ..level }))
}

fn acl_target(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<AclTarget>> {
    let id = ctx.take_required(&mut el, "id");
    let mut target = AclTarget {
        name: el.take("name"),
        ..Default::default()
    };
    ctx.finish(&el);
    let kind = el.name.clone();

    stream.children(&el, |stream, mut child| {
        match child.name.as_str() {
            "role" | "role_ref" => {
                target.roles.extend(ctx.take_required(&mut child, "id"));
                ctx.finish(&child);
                ctx.leaf(stream, &child)?;
            }
            _ => ctx.unknown_child(stream, &kind, child)?,
        }
        Ok(())
    })?;

    Ok(id.map(|id| AclTarget { id, ..target }))
}

fn acl_role(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<AclRole>> {
    let id = ctx.take_required(&mut el, "id");
    let mut role = AclRole {
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, mut child| {
        if child.name != "acl_permission" {
            return ctx.unknown_child(stream, "acl_role", child);
        }
        let permission = AclPermission {
            id: non_empty(child.take("id")).unwrap_or_default(),
            kind: ctx.take_lenient(&mut child, "kind"),
            xpath: child.take("xpath"),
            reference: child.take("reference"),
            object_type: child.take("object-type"),
            attribute: child.take("attribute"),
            description: child.take("description"),
        };
        ctx.finish(&child);
        ctx.leaf(stream, &child)?;
        role.permissions.push(permission);
        Ok(())
    })?;

    Ok(id.map(|id| AclRole { id, ..role }))
}

fn tag(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Tag>> {
    let id = ctx.take_required(&mut el, "id");
    let mut references = Vec::new();
    ctx.finish(&el);

    stream.children(&el, |stream, mut child| {
        if child.name != "obj_ref" {
            return ctx.unknown_child(stream, "tag", child);
        }
        references.extend(ctx.take_required(&mut child, "id"));
        ctx.finish(&child);
        ctx.leaf(stream, &child)
    })?;

    Ok(id.map(|id| Tag { id, references }))
}

fn alert(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Alert>> {
    let id = ctx.take_required(&mut el, "id");
    let mut alert = Alert {
        path: el.take("path"),
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| match child.name.as_str() {
        "select" => stream.children(&child, |stream, selected| {
            if let Some(class) = selected.name.strip_prefix("select_") {
                alert.select.push(class.to_string());
            }
            stream.skip(&selected)
        }),
        "recipient" => {
            alert.recipients.extend(recipient(ctx, stream, child)?);
            Ok(())
        }
        _ => nested_attribute_set(
            ctx,
            stream,
            "alert",
            child,
            &mut alert.instance_attributes,
            &mut alert.meta_attributes,
        ),
    })?;

    Ok(id.map(|id| Alert { id, ..alert }))
}

fn recipient(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<AlertRecipient>> {
    let id = ctx.take_required(&mut el, "id");
    let value = ctx.take_required(&mut el, "value");
    let mut recipient = AlertRecipient {
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        nested_attribute_set(
            ctx,
            stream,
            "recipient",
            child,
            &mut recipient.instance_attributes,
            &mut recipient.meta_attributes,
        )
    })?;

    Ok(match (id, value) {
        (Some(id), Some(value)) => Some(AlertRecipient { id, value, ..recipient }),
        _ => None,
    })
}
