//! Mill expression AST
//!
//! Structured row-filter predicates used by the authorization policies:
//! the node types, their canonical serde shape, and the lenient parser that
//! accepts hand-written JSON/YAML shorthand.

mod node;
mod parser;

pub use node::{ExpressionNode, LiteralValue};
pub use parser::{parse, parse_str, ParseError, REF_PREFIX};
