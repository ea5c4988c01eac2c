//! The `resources` section. Variants are chosen by element name through a
//! fixed dispatch table.

use tracing::warn;

use super::attributes::attribute_set;
use super::{DecodeContext, Element, XmlStream};
use crate::error::CibResult;
use crate::types::{CloneResource, Group, Operation, Primitive, Resource};

type ResourceDecoder =
    fn(&mut DecodeContext<'_>, &mut XmlStream<'_>, Element) -> CibResult<Option<Resource>>;

const RESOURCE_DECODERS: &[(&str, ResourceDecoder)] = &[
    ("primitive", decode_primitive),
    ("group", decode_group),
    ("clone", decode_clone),
    ("master", decode_master),
    ("template", decode_template),
];

fn decoder_for(name: &str) -> Option<ResourceDecoder> {
    RESOURCE_DECODERS
        .iter()
        .find(|(element, _)| *element == name)
        .map(|(_, decoder)| *decoder)
}

/// Decode any resource element; unknown kinds such as `bundle` are skipped.
pub(crate) fn resource(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    parent: &str,
    el: Element,
) -> CibResult<Option<Resource>> {
    match decoder_for(&el.name) {
        Some(decode) => decode(ctx, stream, el),
        None => {
            ctx.unknown_child(stream, parent, el)?;
            Ok(None)
        }
    }
}

fn decode_primitive(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Option<Resource>> {
    Ok(primitive(ctx, stream, el)?.map(Resource::Primitive))
}

fn decode_template(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Option<Resource>> {
    Ok(primitive(ctx, stream, el)?.map(Resource::Template))
}

fn decode_group(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Option<Resource>> {
    Ok(group(ctx, stream, el)?.map(Resource::Group))
}

fn decode_clone(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Option<Resource>> {
    Ok(clone(ctx, stream, el)?.map(Resource::Clone))
}

fn decode_master(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, el: Element) -> CibResult<Option<Resource>> {
    Ok(clone(ctx, stream, el)?.map(Resource::Master))
}

fn primitive(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Primitive>> {
    let id = ctx.take_required(&mut el, "id");
    let mut primitive = Primitive {
        description: el.take("description"),
        class: el.take("class"),
        provider: el.take("provider"),
        agent_type: el.take("type"),
        template: el.take("template"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "instance_attributes" => primitive
                .instance_attributes
                .extend(attribute_set(ctx, stream, child)?),
            "meta_attributes" => primitive.meta_attributes.extend(attribute_set(ctx, stream, child)?),
            "utilization" => primitive.utilization.extend(attribute_set(ctx, stream, child)?),
            "operations" => operations(ctx, stream, child, &mut primitive.operations)?,
            _ => ctx.unknown_child(stream, &el.name, child)?,
        }
        Ok(())
    })?;

    Ok(id.map(|id| Primitive { id, ..primitive }))
}

fn operations(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    mut el: Element,
    out: &mut Vec<Operation>,
) -> CibResult<()> {
    el.ignore(&["id", "id-ref"]);
    ctx.finish(&el);
    stream.children(&el, |stream, child| match child.name.as_str() {
        "op" => {
            out.extend(operation(ctx, stream, child)?);
            Ok(())
        }
        _ => ctx.unknown_child(stream, "operations", child),
    })
}

fn operation(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Operation>> {
    let id = ctx.take_required(&mut el, "id");
    let name = ctx.take_required(&mut el, "name");
    let mut op = Operation {
        interval: ctx.take_duration(&mut el, "interval"),
        timeout: ctx.take_duration(&mut el, "timeout"),
        start_delay: ctx.take_duration(&mut el, "start-delay"),
        interval_origin: el.take("interval-origin"),
        on_fail: ctx.take_lenient(&mut el, "on-fail"),
        requires: ctx.take_lenient(&mut el, "requires"),
        role: ctx.take_lenient(&mut el, "role"),
        enabled: el.take("enabled"),
        record_pending: el.take("record-pending"),
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "instance_attributes" => op.instance_attributes.extend(attribute_set(ctx, stream, child)?),
            "meta_attributes" => op.meta_attributes.extend(attribute_set(ctx, stream, child)?),
            _ => ctx.unknown_child(stream, "op", child)?,
        }
        Ok(())
    })?;

    Ok(match (id, name) {
        (Some(id), Some(name)) => Some(Operation { id, name, ..op }),
        _ => None,
    })
}

fn group(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Group>> {
    let id = ctx.take_required(&mut el, "id");
    let mut group = Group {
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "primitive" => group.children.extend(primitive(ctx, stream, child)?),
            "instance_attributes" => group.instance_attributes.extend(attribute_set(ctx, stream, child)?),
            "meta_attributes" => group.meta_attributes.extend(attribute_set(ctx, stream, child)?),
            name if decoder_for(name).is_some() => {
                warn!(
                    event = "Decode",
                    phase = "Group",
                    group = id.as_deref().unwrap_or_default(),
                    child = name,
                    "only primitives may be grouped, skipping"
                );
                stream.skip(&child)?;
            }
            _ => ctx.unknown_child(stream, "group", child)?,
        }
        Ok(())
    })?;

    Ok(id.map(|id| Group { id, ..group }))
}

/// Shared shape of `clone` and `master`: attribute sets plus exactly one
/// wrapped resource. Extra resources are skipped; a nested clone is kept but
/// reported.
fn clone(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<CloneResource>> {
    let id = ctx.take_required(&mut el, "id");
    let mut clone = CloneResource {
        description: el.take("description"),
        ..Default::default()
    };
    ctx.finish(&el);
    let kind = el.name.clone();

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "instance_attributes" => clone.instance_attributes.extend(attribute_set(ctx, stream, child)?),
            "meta_attributes" => clone.meta_attributes.extend(attribute_set(ctx, stream, child)?),
            name if decoder_for(name).is_some() => {
                if clone.child.is_some() {
                    warn!(
                        event = "Decode",
                        phase = "Clone",
                        kind,
                        clone = id.as_deref().unwrap_or_default(),
                        child = name,
                        "a clone wraps a single resource, skipping extra child"
                    );
                    stream.skip(&child)?;
                    return Ok(());
                }
                if matches!(name, "clone" | "master") {
                    warn!(
                        event = "Decode",
                        phase = "Clone",
                        kind,
                        clone = id.as_deref().unwrap_or_default(),
                        child = name,
                        "nested clone"
                    );
                }
                let parent = kind.clone();
                clone.child = resource(ctx, stream, &parent, child)?.map(Box::new);
            }
            _ => ctx.unknown_child(stream, &kind, child)?,
        }
        Ok(())
    })?;

    Ok(id.map(|id| CloneResource { id, ..clone }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeOptions;
    use crate::tests::capture_logs;
    use crate::types::{Lenient, OnFail, ResourceKind};

    fn decode_resources(xml: &str) -> Vec<Resource> {
        let options = DecodeOptions::default();
        let mut ctx = DecodeContext::new(&options);
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        let mut out = Vec::new();
        stream
            .children(&root, |stream, child| {
                out.extend(resource(&mut ctx, stream, "resources", child)?);
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_dispatch_by_element_name() {
        let resources = decode_resources(
            r#"<resources>
                 <primitive id="vip" class="ocf" provider="heartbeat" type="IPaddr2"/>
                 <template id="web-template" class="ocf" provider="heartbeat" type="apache"/>
                 <group id="g"><primitive id="g1" class="ocf" provider="pacemaker" type="Dummy"/></group>
                 <clone id="c"><primitive id="c1" class="ocf" provider="pacemaker" type="Dummy"/></clone>
                 <master id="ms"><primitive id="db" class="ocf" provider="linbit" type="drbd"/></master>
                 <bundle id="b"><docker image="x"/></bundle>
               </resources>"#,
        );
        let kinds: Vec<_> = resources.iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Primitive,
                ResourceKind::Template,
                ResourceKind::Group,
                ResourceKind::Clone,
                ResourceKind::Master,
            ]
        );
    }

    #[test]
    fn test_primitive_with_operations() {
        let resources = decode_resources(
            r#"<resources>
                 <primitive id="vip" class="ocf" provider="heartbeat" type="IPaddr2">
                   <instance_attributes id="vip-ia"><nvpair id="vip-ip" name="ip" value="192.0.2.1"/></instance_attributes>
                   <operations>
                     <op id="vip-monitor" name="monitor" interval="10s" timeout="20s" on-fail="restart"/>
                     <op id="vip-start" name="start" interval="0" timeout="PT1M" on-fail="explode"/>
                     <op name="stop"/>
                   </operations>
                 </primitive>
               </resources>"#,
        );
        let Resource::Primitive(vip) = &resources[0] else {
            panic!("expected primitive");
        };
        assert_eq!(vip.agent(), "ocf:heartbeat:IPaddr2");
        assert_eq!(vip.operations.len(), 2);
        assert_eq!(vip.operations[0].on_fail, Some(Lenient::Known(OnFail::Restart)));
        assert_eq!(vip.operations[1].on_fail, Some(Lenient::Other("explode".into())));
        assert_eq!(vip.operations[1].timeout_ms(), Some(60_000));
        assert_eq!(resources[0].instance_attributes()[0].get("ip"), Some("192.0.2.1"));
    }

    #[test]
    fn test_group_keeps_only_primitives() {
        let (resources, logs) = capture_logs(|| {
            decode_resources(
                r#"<resources>
                     <group id="g">
                       <primitive id="a" class="ocf" provider="pacemaker" type="Dummy"/>
                       <clone id="bad"><primitive id="x" class="ocf" provider="pacemaker" type="Dummy"/></clone>
                       <primitive id="b" class="ocf" provider="pacemaker" type="Dummy"/>
                     </group>
                   </resources>"#,
            )
        });
        let Resource::Group(group) = &resources[0] else {
            panic!("expected group");
        };
        let ids: Vec<_> = group.children.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(logs.contains("only primitives may be grouped"), "logs: {logs}");
    }

    #[test]
    fn test_nested_clone_does_not_fail() {
        let (resources, logs) = capture_logs(|| {
            decode_resources(
                r#"<resources>
                     <clone id="outer">
                       <meta_attributes id="outer-meta"><nvpair id="outer-max" name="clone-max" value="2"/></meta_attributes>
                       <master id="inner"><primitive id="p" class="ocf" provider="pacemaker" type="Stateful"/></master>
                       <primitive id="extra" class="ocf" provider="pacemaker" type="Dummy"/>
                     </clone>
                   </resources>"#,
            )
        });
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].meta("clone-max"), Some("2"));
        assert_eq!(resources[0].walk().len(), 3);
        assert!(resources[0].find("p").is_some());
        assert!(resources[0].find("extra").is_none());
        assert!(logs.contains("nested clone"), "logs: {logs}");
    }

    #[test]
    fn test_resource_without_id_is_dropped() {
        let resources = decode_resources(
            r#"<resources><primitive class="ocf" type="Dummy"/><primitive id="ok" class="ocf" type="Dummy"/></resources>"#,
        );
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id(), "ok");
    }
}
