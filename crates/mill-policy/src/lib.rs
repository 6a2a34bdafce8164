//! Mill policy model and resolution
//!
//! Policies are loaded from JSON or YAML into an immutable [`PolicySet`]. A
//! [`PolicyActionResolver`] answers, for one principal's active policies and
//! one table, whether the table is readable, which row filters apply and which
//! columns are visible.

mod error;
mod evaluation;
mod io;
mod matcher;
mod model;
mod resolver;
mod store;

pub use error::{ModelValidationError, PolicyError, SerializationError};
pub use evaluation::{
    AccessDecision, ColumnResult, PolicyEvaluationResult, ResolvedActions, ResolvedColumnAccess,
    ResolvedRowFilter, TableRequest, TableResult,
};
pub use io::{
    fingerprint, JsonPolicyExporter, JsonPolicyImporter, PolicyExporter, PolicyFormat, PolicyImporter,
    YamlPolicyExporter, YamlPolicyImporter,
};
pub use matcher::{PolicyMatcher, WILDCARD};
pub use model::{ActionType, ActionVerb, ColumnsMode, Policy, PolicyActionEntry, PolicyActionEntryBuilder, PolicySet};
pub use resolver::PolicyActionResolver;
pub use store::{load_file, PolicyStore};

pub use mill_expr::{ExpressionNode, LiteralValue};
