//! Rules: boolean combinations of attribute, date, operation and resource
//! expressions, possibly nesting further rules.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::enums::{BooleanOp, DateOp, ExpressionOp, Role, ValueSource, ValueType};
use super::lenient::Lenient;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_op: Option<Lenient<BooleanOp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Lenient<Role>>,
    /// Children in document order.
    #[serde(default)]
    #[schema(no_recursion)]
    pub expressions: Vec<RuleExpression>,
}

impl Rule {
    /// `and` unless the rule says otherwise.
    pub fn combinator(&self) -> BooleanOp {
        match self.boolean_op.as_ref().and_then(Lenient::known) {
            Some(op) => *op,
            None => BooleanOp::And,
        }
    }

    /// Number of rule levels, counting this one.
    pub fn depth(&self) -> usize {
        1 + self
            .expressions
            .iter()
            .filter_map(|expr| match expr {
                RuleExpression::Rule(nested) => Some(nested.depth()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Nested rules, in document order.
    pub fn nested_rules(&self) -> impl Iterator<Item = &Rule> {
        self.expressions.iter().filter_map(|expr| match expr {
            RuleExpression::Rule(nested) => Some(nested),
            _ => None,
        })
    }

    /// Identifiers of all direct children, in document order.
    pub fn child_ids(&self) -> String {
        self.expressions
            .iter()
            .map(|expr| expr.id().unwrap_or("-"))
            .join(",")
    }
}

/// One child of a [`Rule`], tagged by its element.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleExpression {
    Expression(Expression),
    DateExpression(DateExpression),
    OpExpression(OpExpression),
    RscExpression(RscExpression),
    Rule(Rule),
}

impl RuleExpression {
    pub fn id(&self) -> Option<&str> {
        match self {
            RuleExpression::Expression(expr) => expr.id.as_deref(),
            RuleExpression::DateExpression(expr) => expr.id.as_deref(),
            RuleExpression::OpExpression(expr) => expr.id.as_deref(),
            RuleExpression::RscExpression(expr) => expr.id.as_deref(),
            RuleExpression::Rule(rule) => rule.id.as_deref(),
        }
    }
}

/// Node attribute comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Expression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Lenient<ExpressionOp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Lenient<ValueType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_source: Option<Lenient<ValueSource>>,
}

/// Time window comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DateExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Lenient<DateOp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DateDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_spec: Option<DateDuration>,
}

/// Shared shape of `duration` and `date_spec`: each field is a value or range
/// such as `"9-16"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DateDuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthdays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yeardays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekyears: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moon: Option<String>,
}

/// Matches an operation by name and interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OpExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// Matches a resource by agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RscExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub agent_type: Option<String>,
}
