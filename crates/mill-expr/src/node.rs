//! Expression AST for row-filter predicates
//!
//! Nodes are plain values: built once, compared by value, never mutated.
//! The serde representation is the canonical `nodeType`-tagged shape; every
//! other accepted shape goes through [`crate::parse`] on the way in.

use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Constant carried by a literal node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Must be finite to serialize; JSON has no NaN or infinity
    Float(f64),
    String(String),
}

impl Serialize for LiteralValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            LiteralValue::Null => serializer.serialize_unit(),
            LiteralValue::Bool(b) => serializer.serialize_bool(*b),
            LiteralValue::Int(i) => serializer.serialize_i64(*i),
            LiteralValue::Float(x) if x.is_finite() => serializer.serialize_f64(*x),
            LiteralValue::Float(x) => Err(S::Error::custom(format!("non-finite float literal: {}", x))),
            LiteralValue::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Bool(value)
    }
}

impl From<i32> for LiteralValue {
    fn from(value: i32) -> Self {
        LiteralValue::Int(i64::from(value))
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Int(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        LiteralValue::Float(value)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::String(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::String(value)
    }
}

impl<T: Into<LiteralValue>> From<Option<T>> for LiteralValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(LiteralValue::Null)
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Bool(b) => write!(f, "{}", b),
            LiteralValue::Int(i) => write!(f, "{}", i),
            LiteralValue::Float(x) => write!(f, "{}", x),
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Structured predicate expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "nodeType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExpressionNode {
    Literal {
        value: LiteralValue,
        #[serde(skip_serializing_if = "Option::is_none")]
        data_type: Option<String>,
    },
    FieldRef {
        #[serde(skip_serializing_if = "Option::is_none")]
        field_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        field_index: Option<i32>,
    },
    Call {
        operator: String,
        operands: Vec<ExpressionNode>,
    },
    Cast {
        operand: Box<ExpressionNode>,
        target_type: String,
    },
    NullCheck {
        operand: Box<ExpressionNode>,
        negated: bool,
    },
    Raw {
        expression: String,
    },
}

impl ExpressionNode {
    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        ExpressionNode::Literal {
            value: value.into(),
            data_type: None,
        }
    }

    pub fn typed_literal(value: impl Into<LiteralValue>, data_type: impl Into<String>) -> Self {
        ExpressionNode::Literal {
            value: value.into(),
            data_type: Some(data_type.into()),
        }
    }

    pub fn null() -> Self {
        Self::literal(LiteralValue::Null)
    }

    /// Reference a field by name
    pub fn field(name: impl Into<String>) -> Self {
        ExpressionNode::FieldRef {
            field_name: Some(name.into()),
            field_index: None,
        }
    }

    /// Reference a field by position
    pub fn field_index(index: i32) -> Self {
        ExpressionNode::FieldRef {
            field_name: None,
            field_index: Some(index),
        }
    }

    pub fn call(operator: impl Into<String>, operands: Vec<ExpressionNode>) -> Self {
        ExpressionNode::Call {
            operator: operator.into(),
            operands,
        }
    }

    pub fn eq(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("eq", vec![left, right])
    }

    pub fn ne(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("ne", vec![left, right])
    }

    pub fn gt(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("gt", vec![left, right])
    }

    pub fn ge(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("ge", vec![left, right])
    }

    pub fn lt(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("lt", vec![left, right])
    }

    pub fn le(left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::call("le", vec![left, right])
    }

    pub fn like(value: ExpressionNode, pattern: ExpressionNode) -> Self {
        Self::call("like", vec![value, pattern])
    }

    pub fn and(operands: impl IntoIterator<Item = ExpressionNode>) -> Self {
        Self::call("and", operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = ExpressionNode>) -> Self {
        Self::call("or", operands.into_iter().collect())
    }

    pub fn not(operand: ExpressionNode) -> Self {
        Self::call("not", vec![operand])
    }

    pub fn between(value: ExpressionNode, low: ExpressionNode, high: ExpressionNode) -> Self {
        Self::call("between", vec![value, low, high])
    }

    /// `value IN (candidates...)`, the tested value is the first operand
    pub fn in_list(value: ExpressionNode, candidates: impl IntoIterator<Item = ExpressionNode>) -> Self {
        let mut operands = vec![value];
        operands.extend(candidates);
        Self::call("in", operands)
    }

    pub fn cast(operand: ExpressionNode, target_type: impl Into<String>) -> Self {
        ExpressionNode::Cast {
            operand: Box::new(operand),
            target_type: target_type.into(),
        }
    }

    pub fn is_null(operand: ExpressionNode) -> Self {
        ExpressionNode::NullCheck {
            operand: Box::new(operand),
            negated: false,
        }
    }

    pub fn is_not_null(operand: ExpressionNode) -> Self {
        ExpressionNode::NullCheck {
            operand: Box::new(operand),
            negated: true,
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        ExpressionNode::Raw {
            expression: expression.into(),
        }
    }

    /// Operator name when this node is a call
    pub fn operator(&self) -> Option<&str> {
        match self {
            ExpressionNode::Call { operator, .. } => Some(operator),
            _ => None,
        }
    }

    /// Operands of a call, empty for every other node
    pub fn operands(&self) -> &[ExpressionNode] {
        match self {
            ExpressionNode::Call { operands, .. } => operands,
            _ => &[],
        }
    }

    /// Named field references in first-seen order, without duplicates
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ExpressionNode::FieldRef {
                field_name: Some(name),
                ..
            } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            ExpressionNode::FieldRef { field_name: None, .. } => {}
            ExpressionNode::Call { operands, .. } => {
                for operand in operands {
                    operand.collect_fields(out);
                }
            }
            ExpressionNode::Cast { operand, .. } | ExpressionNode::NullCheck { operand, .. } => {
                operand.collect_fields(out);
            }
            ExpressionNode::Literal { .. } | ExpressionNode::Raw { .. } => {}
        }
    }
}

impl<'de> Deserialize<'de> for ExpressionNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        crate::parse(&value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::Literal { value, data_type } => match data_type {
                Some(ty) => write!(f, "{}::{}", value, ty),
                None => write!(f, "{}", value),
            },
            ExpressionNode::FieldRef {
                field_name,
                field_index,
            } => match (field_name, field_index) {
                (Some(name), _) => write!(f, "{}", name),
                (None, Some(index)) => write!(f, "${}", index),
                (None, None) => write!(f, "?"),
            },
            ExpressionNode::Call { operator, operands } => {
                write!(f, "{}(", operator)?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
            ExpressionNode::Cast {
                operand,
                target_type,
            } => write!(f, "cast({} as {})", operand, target_type),
            ExpressionNode::NullCheck { operand, negated } => {
                if *negated {
                    write!(f, "{} is not null", operand)
                } else {
                    write!(f, "{} is null", operand)
                }
            }
            ExpressionNode::Raw { expression } => write!(f, "raw({})", expression),
        }
    }
}
