//! Attribute sets and the recursive rule grammar.

use tracing::debug;

use super::{DecodeContext, Element, XmlStream, non_empty};
use crate::error::CibResult;
use crate::types::{
    AttributeSet, DateDuration, DateExpression, Expression, Nvpair, OpExpression, RscExpression,
    Rule, RuleExpression,
};

pub(crate) fn nvpair(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Nvpair> {
    let pair = Nvpair {
        id: non_empty(el.take("id")),
        id_ref: non_empty(el.take("id-ref")),
        name: el.take("name").unwrap_or_default(),
        value: el.take("value"),
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(pair)
}

/// Decode `instance_attributes`, `meta_attributes`, `utilization` and friends.
///
/// A definition is remembered for the rest of the pass. A reference to a set
/// already seen is filled in from it and keeps `id_ref`; a forward or dangling
/// reference decodes to an empty set carrying only `id_ref`.
pub(crate) fn attribute_set(
    ctx: &mut DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    mut el: Element,
) -> CibResult<Option<AttributeSet>> {
    let mut set = AttributeSet {
        id: non_empty(el.take("id")),
        id_ref: non_empty(el.take("id-ref")),
        score: el.take("score"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| match child.name.as_str() {
        "nvpair" => {
            set.values.push(nvpair(ctx, stream, child)?);
            Ok(())
        }
        "rule" => {
            set.rules.push(rule(ctx, stream, child)?);
            Ok(())
        }
        _ => ctx.unknown_child(stream, &el.name, child),
    })?;

    if let Some(id) = set.id.clone() {
        ctx.register_set(&id, &set);
    } else if let Some(reference) = set.id_ref.clone() {
        match ctx.resolve_set(&reference) {
            Some(referent) => {
                set.values = referent.values.clone();
                set.rules = referent.rules.clone();
                if set.score.is_none() {
                    set.score = referent.score.clone();
                }
            }
            None => debug!(
                event = "Decode",
                phase = "Reference",
                element = el.name,
                id_ref = reference,
                "reference not yet seen, left unresolved"
            ),
        }
    } else {
        ctx.missing(&el.name, "id");
        return Ok(None);
    }
    Ok(Some(set))
}

/// Decode a `rule` and everything nested in it.
///
/// Rules contain rules. The children loop ends when the stream depth returns
/// to this element's own level, so an inner `</rule>` never closes the outer one.
pub(crate) fn rule(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Rule> {
    let mut decoded = Rule {
        id: non_empty(el.take("id")),
        id_ref: non_empty(el.take("id-ref")),
        score: el.take("score"),
        score_attribute: el.take("score-attribute"),
        boolean_op: ctx.take_lenient(&mut el, "boolean-op"),
        role: ctx.take_lenient(&mut el, "role"),
        expressions: Vec::new(),
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| {
        let expression = match child.name.as_str() {
            "expression" => RuleExpression::Expression(expression(ctx, stream, child)?),
            "date_expression" => RuleExpression::DateExpression(date_expression(ctx, stream, child)?),
            "op_expression" => RuleExpression::OpExpression(op_expression(ctx, stream, child)?),
            "rsc_expression" => RuleExpression::RscExpression(rsc_expression(ctx, stream, child)?),
            "rule" => RuleExpression::Rule(rule(ctx, stream, child)?),
            _ => return ctx.unknown_child(stream, "rule", child),
        };
        decoded.expressions.push(expression);
        Ok(())
    })?;
    Ok(decoded)
}

fn expression(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<Expression> {
    let expression = Expression {
        id: non_empty(el.take("id")),
        attribute: el.take("attribute"),
        operation: ctx.take_lenient(&mut el, "operation"),
        value: el.take("value"),
        value_type: ctx.take_lenient(&mut el, "type"),
        value_source: ctx.take_lenient(&mut el, "value-source"),
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(expression)
}

fn date_expression(
    ctx: &DecodeContext<'_>,
    stream: &mut XmlStream<'_>,
    mut el: Element,
) -> CibResult<DateExpression> {
    let mut expression = DateExpression {
        id: non_empty(el.take("id")),
        operation: ctx.take_lenient(&mut el, "operation"),
        start: el.take("start"),
        end: el.take("end"),
        ..Default::default()
    };
    ctx.finish(&el);

    stream.children(&el, |stream, child| match child.name.as_str() {
        "duration" => {
            expression.duration = Some(date_duration(ctx, stream, child)?);
            Ok(())
        }
        "date_spec" => {
            expression.date_spec = Some(date_duration(ctx, stream, child)?);
            Ok(())
        }
        _ => ctx.unknown_child(stream, "date_expression", child),
    })?;
    Ok(expression)
}

fn date_duration(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<DateDuration> {
    let duration = DateDuration {
        id: non_empty(el.take("id")),
        years: el.take("years"),
        months: el.take("months"),
        weeks: el.take("weeks"),
        days: el.take("days"),
        hours: el.take("hours"),
        minutes: el.take("minutes"),
        seconds: el.take("seconds"),
        monthdays: el.take("monthdays"),
        weekdays: el.take("weekdays"),
        yeardays: el.take("yeardays"),
        weekyears: el.take("weekyears"),
        moon: el.take("moon"),
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(duration)
}

fn op_expression(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<OpExpression> {
    let expression = OpExpression {
        id: non_empty(el.take("id")),
        name: el.take("name"),
        interval: ctx.take_duration(&mut el, "interval"),
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(expression)
}

fn rsc_expression(ctx: &DecodeContext<'_>, stream: &mut XmlStream<'_>, mut el: Element) -> CibResult<RscExpression> {
    let expression = RscExpression {
        id: non_empty(el.take("id")),
        class: el.take("class"),
        provider: el.take("provider"),
        agent_type: el.take("type"),
    };
    ctx.finish(&el);
    ctx.leaf(stream, &el)?;
    Ok(expression)
}
