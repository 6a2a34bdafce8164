//! Hand-written YAML predicates decoded straight into the AST

use mill_expr::{ExpressionNode, LiteralValue};

#[test]
fn test_ref_prefix_and_literals() {
    let yaml = r##"
and:
  - eq: ["#ref.department", "analytics"]
  - gt: ["#ref.amount", 1000]
"##;
    let node: ExpressionNode = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(node.operator(), Some("and"));
    let eq = &node.operands()[0];
    assert_eq!(eq.operator(), Some("eq"));
    assert_eq!(eq.operands()[0], ExpressionNode::field("department"));
    assert_eq!(eq.operands()[1], ExpressionNode::literal("analytics"));
    assert_eq!(
        node.operands()[1].operands()[1],
        ExpressionNode::Literal {
            value: LiteralValue::Int(1000),
            data_type: None
        }
    );
}

#[test]
fn test_ref_and_const_objects() {
    let yaml = r#"
eq:
  - ref: department
  - const: analytics
"#;
    let node: ExpressionNode = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        node,
        ExpressionNode::eq(ExpressionNode::field("department"), ExpressionNode::literal("analytics"))
    );
}

#[test]
fn test_mixed_shapes() {
    let yaml = r##"
or:
  - between:
      field: "#ref.age"
      low: 18
      high: 65
  - not:
      - in: ["#ref.region", "US", "EU"]
  - nodeType: nullCheck
    operand: { field: email }
    negated: false
  - call:
      function: like
      args: ["#ref.name", "A%"]
"##;
    let node: ExpressionNode = serde_yaml::from_str(yaml).unwrap();

    let expected = ExpressionNode::or([
        ExpressionNode::between(
            ExpressionNode::field("age"),
            ExpressionNode::literal(18),
            ExpressionNode::literal(65),
        ),
        ExpressionNode::not(ExpressionNode::in_list(
            ExpressionNode::field("region"),
            [ExpressionNode::literal("US"), ExpressionNode::literal("EU")],
        )),
        ExpressionNode::is_null(ExpressionNode::field("email")),
        ExpressionNode::like(ExpressionNode::field("name"), ExpressionNode::literal("A%")),
    ]);
    assert_eq!(node, expected);
}

#[test]
fn test_yaml_canonical_round_trip() {
    let original = ExpressionNode::and([
        ExpressionNode::eq(ExpressionNode::field("status"), ExpressionNode::literal("ACTIVE")),
        ExpressionNode::not(ExpressionNode::eq(
            ExpressionNode::field("archived"),
            ExpressionNode::literal(true),
        )),
        ExpressionNode::cast(ExpressionNode::field("score"), "DOUBLE"),
        ExpressionNode::ge(ExpressionNode::field("ratio"), ExpressionNode::literal(0.25)),
    ]);

    let yaml = serde_yaml::to_string(&original).unwrap();
    assert!(yaml.contains("nodeType: call"));
    let restored: ExpressionNode = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(original, restored);
}

#[test]
fn test_malformed_yaml_expression() {
    let err = serde_yaml::from_str::<ExpressionNode>("[1, 2]").unwrap_err();
    assert!(err.to_string().contains("top-level array"));

    let err = serde_yaml::from_str::<ExpressionNode>("nodeType: lambda").unwrap_err();
    assert!(err.to_string().contains("Unknown expression nodeType"));
}
