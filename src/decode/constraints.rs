//! The `constraints` section.

use super::attributes::rule;
use super::{DecodeContext, Element, XmlStream, non_empty};
use crate::error::CibResult;
use crate::types::{Colocation, Constraint, Location, Order, ResourceSet, Ticket};

type ConstraintDecoder =
    fn(&mut DecodeContext<'_>, &mut XmlStream<'_>, Element) -> CibResult<Option<Constraint>>;

const CONSTRAINT_DECODERS: &[(&str, ConstraintDecoder)] = &[
    ("rsc_location", location),
    ("rsc_colocation", colocation),
    ("rsc_order", order),
    ("rsc_ticket", ticket),
];

pub(crate) fn constraint(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    el: Element,
) -> CibResult<Option<Constraint>> {
    let decoder = CONSTRAINT_DECODERS
        .iter()
        .find(|(name, _)| *name == el.name)
        .map(|(_, decoder)| *decoder);
    match decoder {
        Some(decode) => decode(ctx, stream, el),
        None => {
            ctx.unknown_child(stream, "constraints", el)?;
            Ok(None)
        }
    }
}

fn location(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Constraint>> {
    let id = ctx.take_required(&mut el, "id");
    let mut location = Location {
        rsc: el.take("rsc"),
        rsc_pattern: el.take("rsc-pattern"),
        role: ctx.take_lenient(&mut el, "role"),
        score: el.take("score"),
        node: el.take("node"),
        resource_discovery: ctx.take_lenient(&mut el, "resource-discovery"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        match child.name.as_str() {
            "rule" => location.rules.push(rule(ctx, stream, child)?),
            "resource_set" => location.resource_sets.extend(resource_set(ctx, stream, child)?),
            _ => ctx.unknown_child(stream, "rsc_location", child)?,
        }
        Ok(())
    })?;

    Ok(id.map(|id| Constraint::Location(Location { id, ..location })))
}

fn colocation(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Constraint>> {
    let id = ctx.take_required(&mut el, "id");
    let mut colocation = Colocation {
        rsc: el.take("rsc"),
        with_rsc: el.take("with-rsc"),
        rsc_role: ctx.take_lenient(&mut el, "rsc-role"),
        with_rsc_role: ctx.take_lenient(&mut el, "with-rsc-role"),
        score: el.take("score"),
        node_attribute: el.take("node-attribute"),
        ..Default::default()
    };
    ctx.finish(&el);
    resource_sets(ctx, stream, &el, &mut colocation.resource_sets)?;
    Ok(id.map(|id| Constraint::Colocation(Colocation { id, ..colocation })))
}

fn order(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Constraint>> {
    let id = ctx.take_required(&mut el, "id");
    let mut order = Order {
        first: el.take("first"),
        then: el.take("then"),
        first_action: ctx.take_lenient(&mut el, "first-action"),
        then_action: ctx.take_lenient(&mut el, "then-action"),
        kind: ctx.take_lenient(&mut el, "kind"),
        symmetrical: el.take("symmetrical"),
        score: el.take("score"),
        ..Default::default()
    };
    ctx.finish(&el);
    resource_sets(ctx, stream, &el, &mut order.resource_sets)?;
    Ok(id.map(|id| Constraint::Order(Order { id, ..order })))
}

fn ticket(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<Constraint>> {
    let id = ctx.take_required(&mut el, "id");
    let mut ticket = Ticket {
        ticket: el.take("ticket"),
        rsc: el.take("rsc"),
        rsc_role: ctx.take_lenient(&mut el, "rsc-role"),
        loss_policy: ctx.take_lenient(&mut el, "loss-policy"),
        ..Default::default()
    };
    ctx.finish(&el);
    resource_sets(ctx, stream, &el, &mut ticket.resource_sets)?;
    Ok(id.map(|id| Constraint::Ticket(Ticket { id, ..ticket })))
}

/// Children of a constraint that only carries resource sets.
fn resource_sets(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    el: &Element,
    out: &mut Vec<ResourceSet>,
) -> CibResult<()> {
    stream.children(el, |stream, child| match child.name.as_str() {
        "resource_set" => {
            out.extend(resource_set(ctx, stream, child)?);
            Ok(())
        }
        _ => ctx.unknown_child(stream, &el.name, child),
    })
}

fn resource_set(ctx: &mut DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Option<ResourceSet>> {
    let id = non_empty(el.take("id"));
    let id_ref = non_empty(el.take("id-ref"));
    let mut set = ResourceSet {
        sequential: el.take("sequential"),
        require_all: el.take("require-all"),
        ordering: el.take("ordering"),
        action: ctx.take_lenient(&mut el, "action"),
        role: ctx.take_lenient(&mut el, "role"),
        score: el.take("score"),
        kind: ctx.take_lenient(&mut el, "kind"),
        ..Default::default()
    };
    ctx.finish(&el);
    resource_refs(ctx, stream, &el, &mut set.resources)?;

    if id.is_none() && id_ref.is_none() {
        ctx.missing(&el.name, "id");
        return Ok(None);
    }
    Ok(Some(ResourceSet { id, id_ref, ..set }))
}

/// Flatten `resource_ref` elements below `el` into resource names, in
/// document order.
fn resource_refs(
    ctx: &DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    el: &Element,
    out: &mut Vec<String>,
) -> CibResult<()> {
    stream.children(el, |stream, mut child| {
        if child.name != "resource_ref" {
            return ctx.unknown_child(stream, &el.name, child);
        }
        if let Some(id) = ctx.take_required(&mut child, "id") {
            out.push(id);
        }
        ctx.finish(&child);
        resource_refs(ctx, stream, &child, out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeOptions;
    use crate::tests::capture_logs;
    use crate::types::{ConstraintKind, Lenient, LossPolicy, OrderKind};

    fn decode_constraints(xml: &str) -> Vec<Constraint> {
        let options = DecodeOptions::default();
        let mut ctx = DecodeContext::new(&options);
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        let mut out = Vec::new();
        stream
            .children(&root, |stream, child| {
                out.extend(constraint(&mut ctx, stream, child)?);
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_dispatch_by_element_name() {
        let constraints = decode_constraints(
            r#"<constraints>
                 <rsc_location id="loc" rsc="vip" node="n1" score="100"/>
                 <rsc_colocation id="col" rsc="web" with-rsc="vip" score="INFINITY"/>
                 <rsc_order id="ord" first="vip" then="web" kind="Mandatory"/>
                 <rsc_ticket id="tkt" ticket="site-a" rsc="db" loss-policy="fence"/>
                 <rsc_future id="later"/>
               </constraints>"#,
        );
        let kinds: Vec<_> = constraints.iter().map(Constraint::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstraintKind::Location,
                ConstraintKind::Colocation,
                ConstraintKind::Order,
                ConstraintKind::Ticket,
            ]
        );
        let Constraint::Order(order) = &constraints[2] else {
            panic!("expected order");
        };
        assert_eq!(order.kind, Some(Lenient::Known(OrderKind::Mandatory)));
        let Constraint::Ticket(ticket) = &constraints[3] else {
            panic!("expected ticket");
        };
        assert_eq!(ticket.loss_policy, Some(Lenient::Known(LossPolicy::Fence)));
    }

    #[test]
    fn test_resource_sets_flatten_refs_in_order() {
        let constraints = decode_constraints(
            r#"<constraints>
                 <rsc_order id="ord-set">
                   <resource_set id="s1" sequential="false">
                     <resource_ref id="a"/><resource_ref id="b"/>
                   </resource_set>
                   <resource_set id="s2"><resource_ref id="c"/></resource_set>
                 </rsc_order>
               </constraints>"#,
        );
        let sets = constraints[0].resource_sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].resources, vec!["a", "b"]);
        assert_eq!(sets[0].sequential.as_deref(), Some("false"));
        assert_eq!(constraints[0].resources(), vec!["a", "b", "c"]);
        assert!(constraints[0].references("c"));
    }

    #[test]
    fn test_resource_set_without_identity_is_dropped_once() {
        let (constraints, logs) = capture_logs(|| {
            decode_constraints(
                r#"<constraints>
                     <rsc_colocation id="col-set" score="INFINITY">
                       <resource_set sequential="true"><resource_ref id="a"/></resource_set>
                       <resource_set id="kept"><resource_ref id="b"/></resource_set>
                     </rsc_colocation>
                   </constraints>"#,
            )
        });
        let sets = constraints[0].resource_sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].id.as_deref(), Some("kept"));
        assert_eq!(logs.matches("dropping element without required attribute").count(), 1, "logs: {logs}");
        assert!(logs.contains("resource_set"), "logs: {logs}");
    }

    #[test]
    fn test_location_with_rule() {
        let constraints = decode_constraints(
            r#"<constraints>
                 <rsc_location id="loc-rule" rsc="vip">
                   <rule id="loc-rule-r" score="-INFINITY" boolean-op="and">
                     <expression id="loc-rule-e" attribute="pingd" operation="not_defined"/>
                   </rule>
                 </rsc_location>
               </constraints>"#,
        );
        let Constraint::Location(location) = &constraints[0] else {
            panic!("expected location");
        };
        assert_eq!(location.rules.len(), 1);
        assert_eq!(location.rules[0].score.as_deref(), Some("-INFINITY"));
        assert_eq!(location.rules[0].child_ids(), "loc-rule-e");
    }
}
