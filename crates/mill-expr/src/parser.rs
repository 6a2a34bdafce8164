//! Shape-sniffing parser from decoded JSON/YAML values into [`ExpressionNode`]
//!
//! Objects are tried against an ordered list of shape matchers. A matcher
//! returns `None` when the object is not its shape, so the next one gets a
//! turn; the first `Some` wins, including `Some(Err(..))`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::node::{ExpressionNode, LiteralValue};

/// String prefix that turns a scalar into a field reference: `"#ref.amount"`
pub const REF_PREFIX: &str = "#ref.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected top-level array expression: {0}")]
    TopLevelArray(String),

    #[error("Unknown expression nodeType: {0}")]
    UnknownNodeType(String),

    #[error("{shape} expression requires {field}")]
    MissingField {
        shape: &'static str,
        field: &'static str,
    },

    #[error("Invalid {field} in {shape} expression: {value}")]
    InvalidField {
        shape: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Unsupported literal value: {0}")]
    InvalidLiteral(String),

    #[error("not expects exactly one operand, got {0}")]
    NotArity(usize),

    #[error("Cannot parse expression node: {0}")]
    Unrecognized(String),
}

type Shape = fn(&Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>>;

const SHAPES: &[Shape] = &[
    typed_shape,
    ref_shape,
    field_ref_shape,
    field_shape,
    value_shape,
    const_shape,
    operator_shape,
    call_shape,
    between_shape,
    single_key_shape,
];

/// Parse a decoded document value into an expression
pub fn parse(node: &Value) -> Result<ExpressionNode, ParseError> {
    match node {
        Value::Null => Ok(ExpressionNode::null()),
        Value::String(text) => Ok(parse_text(text)),
        Value::Bool(_) | Value::Number(_) => Ok(ExpressionNode::literal(literal_value(node)?)),
        Value::Array(_) => Err(ParseError::TopLevelArray(node.to_string())),
        Value::Object(map) => {
            for shape in SHAPES {
                if let Some(result) = shape(map) {
                    return result;
                }
            }
            Err(ParseError::Unrecognized(node.to_string()))
        }
    }
}

/// Parse a JSON text into an expression
pub fn parse_str(source: &str) -> Result<ExpressionNode, ParseError> {
    let value: Value =
        serde_json::from_str(source).map_err(|e| ParseError::Unrecognized(e.to_string()))?;
    parse(&value)
}

fn parse_text(text: &str) -> ExpressionNode {
    match text.strip_prefix(REF_PREFIX) {
        Some(name) if !name.is_empty() => ExpressionNode::field(name),
        _ => ExpressionNode::literal(text),
    }
}

fn typed_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    let node_type = map.get("nodeType")?;
    Some(parse_typed(node_type, map))
}

fn parse_typed(node_type: &Value, map: &Map<String, Value>) -> Result<ExpressionNode, ParseError> {
    let node_type = node_type
        .as_str()
        .ok_or_else(|| ParseError::UnknownNodeType(node_type.to_string()))?;

    match node_type {
        "literal" => parse_literal_object(map),
        "fieldRef" => parse_field_ref(map),
        "call" => parse_operator_object(map),
        "cast" => Ok(ExpressionNode::Cast {
            operand: Box::new(required_operand(map, "operand", "cast")?),
            target_type: required_text(map, "targetType", "cast")?,
        }),
        "nullCheck" => Ok(ExpressionNode::NullCheck {
            operand: Box::new(required_operand(map, "operand", "nullCheck")?),
            negated: match map.get("negated") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(b)) => *b,
                Some(other) => {
                    return Err(ParseError::InvalidField {
                        shape: "nullCheck",
                        field: "negated",
                        value: other.to_string(),
                    })
                }
            },
        }),
        "raw" => Ok(ExpressionNode::Raw {
            expression: required_text(map, "expression", "raw")?,
        }),
        other => Err(ParseError::UnknownNodeType(other.to_string())),
    }
}

fn ref_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    map.get("ref")?;
    Some(required_text(map, "ref", "ref").map(ExpressionNode::field))
}

fn field_ref_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    if !map.contains_key("fieldName") && !map.contains_key("fieldIndex") {
        return None;
    }
    Some(parse_field_ref(map))
}

fn parse_field_ref(map: &Map<String, Value>) -> Result<ExpressionNode, ParseError> {
    Ok(ExpressionNode::FieldRef {
        field_name: optional_text(map, "fieldName", "fieldRef")?,
        field_index: optional_index(map, "fieldRef")?,
    })
}

fn field_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    map.get("field")?;
    Some(required_text(map, "field", "field").map(ExpressionNode::field))
}

fn value_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    map.get("value")?;
    Some(parse_literal_object(map))
}

fn parse_literal_object(map: &Map<String, Value>) -> Result<ExpressionNode, ParseError> {
    Ok(ExpressionNode::Literal {
        value: literal_value(map.get("value").unwrap_or(&Value::Null))?,
        data_type: optional_text(map, "dataType", "literal")?,
    })
}

fn const_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    let value = map.get("const")?;
    Some(literal_value(value).map(ExpressionNode::literal))
}

fn operator_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    map.get("operator")?;
    Some(parse_operator_object(map))
}

fn parse_operator_object(map: &Map<String, Value>) -> Result<ExpressionNode, ParseError> {
    Ok(ExpressionNode::Call {
        operator: required_text(map, "operator", "call")?,
        operands: parse_operands(map.get("operands"))?,
    })
}

fn call_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    let call = map.get("call")?;
    Some(parse_call_object(call))
}

fn parse_call_object(call: &Value) -> Result<ExpressionNode, ParseError> {
    let inner = match call {
        Value::Null => {
            return Err(ParseError::MissingField {
                shape: "call",
                field: "function/operator",
            })
        }
        Value::Object(inner) => inner,
        other => {
            return Err(ParseError::InvalidField {
                shape: "call",
                field: "call",
                value: other.to_string(),
            })
        }
    };

    let operator = match optional_text(inner, "function", "call")? {
        Some(function) => Some(function),
        None => optional_text(inner, "operator", "call")?,
    };
    let operator = operator
        .filter(|op| !op.trim().is_empty())
        .ok_or(ParseError::MissingField {
            shape: "call",
            field: "function/operator",
        })?;

    Ok(ExpressionNode::Call {
        operator,
        operands: parse_operands(inner.get("args"))?,
    })
}

fn between_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    let between = map.get("between")?;
    Some(parse_between_object(between))
}

fn parse_between_object(between: &Value) -> Result<ExpressionNode, ParseError> {
    let inner = match between {
        Value::Object(inner) => inner,
        Value::Null => {
            return Err(ParseError::MissingField {
                shape: "between",
                field: "field",
            })
        }
        other => {
            return Err(ParseError::InvalidField {
                shape: "between",
                field: "between",
                value: other.to_string(),
            })
        }
    };

    Ok(ExpressionNode::between(
        required_operand(inner, "field", "between")?,
        required_operand(inner, "low", "between")?,
        required_operand(inner, "high", "between")?,
    ))
}

fn single_key_shape(map: &Map<String, Value>) -> Option<Result<ExpressionNode, ParseError>> {
    if map.len() != 1 {
        return None;
    }
    let (operator, operand) = map.iter().next()?;
    Some(parse_operator_call(operator, operand))
}

fn parse_operator_call(operator: &str, operand: &Value) -> Result<ExpressionNode, ParseError> {
    if operator.eq_ignore_ascii_case("not") {
        return match operand {
            Value::Array(items) if items.len() == 1 => Ok(ExpressionNode::not(parse(&items[0])?)),
            Value::Array(items) => Err(ParseError::NotArity(items.len())),
            single => Ok(ExpressionNode::not(parse(single)?)),
        };
    }
    Ok(ExpressionNode::call(operator, parse_operands(Some(operand))?))
}

fn parse_operands(node: Option<&Value>) -> Result<Vec<ExpressionNode>, ParseError> {
    match node {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(parse).collect(),
        Some(single) => Ok(vec![parse(single)?]),
    }
}

fn literal_value(value: &Value) -> Result<LiteralValue, ParseError> {
    match value {
        Value::Null => Ok(LiteralValue::Null),
        Value::Bool(b) => Ok(LiteralValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(LiteralValue::Int(i)),
            None => n
                .as_f64()
                .map(LiteralValue::Float)
                .ok_or_else(|| ParseError::InvalidLiteral(n.to_string())),
        },
        Value::String(s) => Ok(LiteralValue::String(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(ParseError::InvalidLiteral(value.to_string())),
    }
}

fn required_operand(
    map: &Map<String, Value>,
    field: &'static str,
    shape: &'static str,
) -> Result<ExpressionNode, ParseError> {
    match map.get(field) {
        Some(value) => parse(value),
        None => Err(ParseError::MissingField { shape, field }),
    }
}

fn required_text(
    map: &Map<String, Value>,
    field: &'static str,
    shape: &'static str,
) -> Result<String, ParseError> {
    optional_text(map, field, shape)?.ok_or(ParseError::MissingField { shape, field })
}

fn optional_text(
    map: &Map<String, Value>,
    field: &'static str,
    shape: &'static str,
) -> Result<Option<String>, ParseError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ParseError::InvalidField {
            shape,
            field,
            value: other.to_string(),
        }),
    }
}

fn optional_index(map: &Map<String, Value>, shape: &'static str) -> Result<Option<i32>, ParseError> {
    match map.get("fieldIndex") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| ParseError::InvalidField {
                shape,
                field: "fieldIndex",
                value: value.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(parse(&Value::Null).unwrap(), ExpressionNode::null());
        assert_eq!(parse(&json!("#ref.amount")).unwrap(), ExpressionNode::field("amount"));
        assert_eq!(parse(&json!("#ref.")).unwrap(), ExpressionNode::literal("#ref."));
        assert_eq!(parse(&json!("plain")).unwrap(), ExpressionNode::literal("plain"));
        assert_eq!(parse(&json!(42)).unwrap(), ExpressionNode::literal(42));
        assert_eq!(parse(&json!(2.5)).unwrap(), ExpressionNode::literal(2.5));
        assert_eq!(parse(&json!(true)).unwrap(), ExpressionNode::literal(true));
    }

    #[test]
    fn test_top_level_array_rejected() {
        let err = parse(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ParseError::TopLevelArray(_)));
    }

    #[test]
    fn test_operator_as_key() {
        let node = parse(&json!({
            "and": [
                {"eq": ["#ref.department", "analytics"]},
                {"gt": ["#ref.amount", 1000]}
            ]
        }))
        .unwrap();

        let expected = ExpressionNode::and([
            ExpressionNode::eq(ExpressionNode::field("department"), ExpressionNode::literal("analytics")),
            ExpressionNode::gt(ExpressionNode::field("amount"), ExpressionNode::literal(1000)),
        ]);
        assert_eq!(node, expected);
    }

    #[test]
    fn test_not_unwraps_single_operand() {
        let expected = ExpressionNode::not(ExpressionNode::eq(
            ExpressionNode::field("status"),
            ExpressionNode::literal("archived"),
        ));
        assert_eq!(
            parse(&json!({"not": [{"eq": ["#ref.status", "archived"]}]})).unwrap(),
            expected
        );
        assert_eq!(parse(&json!({"NOT": {"eq": ["#ref.status", "archived"]}})).unwrap(), expected);
        assert_eq!(
            parse(&json!({"not": [1, 2]})).unwrap_err(),
            ParseError::NotArity(2)
        );
    }

    #[test]
    fn test_single_operand_becomes_list() {
        let node = parse(&json!({"isTrue": "#ref.active"})).unwrap();
        assert_eq!(node, ExpressionNode::call("isTrue", vec![ExpressionNode::field("active")]));

        let node = parse(&json!({"operator": "upper", "operands": "#ref.name"})).unwrap();
        assert_eq!(node, ExpressionNode::call("upper", vec![ExpressionNode::field("name")]));
    }

    #[test]
    fn test_object_field_forms() {
        assert_eq!(parse(&json!({"ref": "a"})).unwrap(), ExpressionNode::field("a"));
        assert_eq!(parse(&json!({"field": "a"})).unwrap(), ExpressionNode::field("a"));
        assert_eq!(parse(&json!({"fieldIndex": 4})).unwrap(), ExpressionNode::field_index(4));
        assert_eq!(
            parse(&json!({"fieldName": "a", "fieldIndex": 1})).unwrap(),
            ExpressionNode::FieldRef {
                field_name: Some("a".to_string()),
                field_index: Some(1)
            }
        );
        assert!(matches!(
            parse(&json!({"fieldIndex": "x"})).unwrap_err(),
            ParseError::InvalidField { field: "fieldIndex", .. }
        ));
        // names are never stringified from other scalars
        assert_eq!(
            parse(&json!({"ref": 5})).unwrap_err(),
            ParseError::InvalidField {
                shape: "ref",
                field: "ref",
                value: "5".to_string()
            }
        );
        assert!(matches!(
            parse(&json!({"field": true})).unwrap_err(),
            ParseError::InvalidField { field: "field", .. }
        ));
    }

    #[test]
    fn test_object_literal_forms() {
        assert_eq!(parse(&json!({"const": "analytics"})).unwrap(), ExpressionNode::literal("analytics"));
        assert_eq!(
            parse(&json!({"value": 10, "dataType": "BIGINT"})).unwrap(),
            ExpressionNode::typed_literal(10, "BIGINT")
        );
        assert!(matches!(
            parse(&json!({"const": [1]})).unwrap_err(),
            ParseError::InvalidLiteral(_)
        ));
    }

    #[test]
    fn test_call_object() {
        let node = parse(&json!({"call": {"function": "like", "args": ["#ref.name", "A%"]}})).unwrap();
        assert_eq!(
            node,
            ExpressionNode::like(ExpressionNode::field("name"), ExpressionNode::literal("A%"))
        );

        let node = parse(&json!({"call": {"operator": "lower", "args": "#ref.name"}})).unwrap();
        assert_eq!(node.operator(), Some("lower"));

        assert_eq!(
            parse(&json!({"call": {"args": []}})).unwrap_err(),
            ParseError::MissingField {
                shape: "call",
                field: "function/operator"
            }
        );
    }

    #[test]
    fn test_between_object() {
        let node = parse(&json!({"between": {"field": "#ref.age", "low": 18, "high": 65}})).unwrap();
        assert_eq!(
            node,
            ExpressionNode::between(
                ExpressionNode::field("age"),
                ExpressionNode::literal(18),
                ExpressionNode::literal(65)
            )
        );

        assert_eq!(
            parse(&json!({"between": {"low": 1, "high": 2}})).unwrap_err(),
            ParseError::MissingField {
                shape: "between",
                field: "field"
            }
        );
    }

    #[test]
    fn test_typed_forms() {
        let node = parse(&json!({
            "nodeType": "nullCheck",
            "operand": {"nodeType": "fieldRef", "fieldName": "email"},
            "negated": true
        }))
        .unwrap();
        assert_eq!(node, ExpressionNode::is_not_null(ExpressionNode::field("email")));

        let node = parse(&json!({
            "nodeType": "cast",
            "operand": "#ref.amount",
            "targetType": "DECIMAL"
        }))
        .unwrap();
        assert_eq!(node, ExpressionNode::cast(ExpressionNode::field("amount"), "DECIMAL"));

        let node = parse(&json!({"nodeType": "raw", "expression": "x > 10"})).unwrap();
        assert_eq!(node, ExpressionNode::raw("x > 10"));

        let node = parse(&json!({"nodeType": "call", "operator": "now"})).unwrap();
        assert_eq!(node, ExpressionNode::call("now", vec![]));
    }

    #[test]
    fn test_typed_errors() {
        assert_eq!(
            parse(&json!({"nodeType": "lambda"})).unwrap_err(),
            ParseError::UnknownNodeType("lambda".to_string())
        );
        assert_eq!(
            parse(&json!({"nodeType": "cast", "operand": 1})).unwrap_err(),
            ParseError::MissingField {
                shape: "cast",
                field: "targetType"
            }
        );
        assert_eq!(
            parse(&json!({"nodeType": "call"})).unwrap_err(),
            ParseError::MissingField {
                shape: "call",
                field: "operator"
            }
        );
    }

    #[test]
    fn test_unrecognized_object() {
        let err = parse(&json!({"foo": 1, "bar": 2})).unwrap_err();
        assert!(matches!(err, ParseError::Unrecognized(_)));
    }

    #[test]
    fn test_parse_str() {
        let node = parse_str(r##"{"eq": ["#ref.a", 1]}"##).unwrap();
        assert_eq!(node, ExpressionNode::eq(ExpressionNode::field("a"), ExpressionNode::literal(1)));
        assert!(parse_str("{not json").is_err());
    }
}
