//! Decision types handed to the query rewriter

use mill_expr::ExpressionNode;
use serde::{Deserialize, Serialize};

use crate::matcher::PolicyMatcher;
use crate::model::{ActionVerb, ColumnsMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessDecision {
    Allowed,
    Denied,
}

/// A row predicate the rewriter must AND into the query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRowFilter {
    pub policy_name: String,
    pub verb: ActionVerb,
    pub expression: Option<ExpressionNode>,
    pub raw_expression: Option<String>,
    /// Set when the filter is the complement of an exclusive partition
    pub negated: bool,
}

/// Column rule contributed by an active policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColumnAccess {
    pub policy_name: String,
    pub verb: ActionVerb,
    pub mode: ColumnsMode,
    pub columns: Vec<String>,
}

/// Everything the active policies say about one table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedActions {
    pub table: Vec<String>,
    pub table_access: AccessDecision,
    /// First active policy that denied the table
    pub denied_by: Option<String>,
    pub row_filters: Vec<ResolvedRowFilter>,
    pub column_access: Vec<ResolvedColumnAccess>,
}

impl ResolvedActions {
    pub fn is_denied(&self) -> bool {
        self.table_access == AccessDecision::Denied
    }

    pub fn has_row_filters(&self) -> bool {
        !self.row_filters.is_empty()
    }

    pub fn has_column_restrictions(&self) -> bool {
        !self.column_access.is_empty()
    }

    /// Decide one column: exclusions win, then the union of include lists
    /// applies when any exists, otherwise the column is allowed.
    pub fn column_decision(&self, column: &str) -> ColumnResult {
        let matcher = PolicyMatcher::new();

        if let Some(rule) = self
            .column_access
            .iter()
            .filter(|r| r.mode == ColumnsMode::Exclude)
            .find(|r| matcher.matches_any_column(&r.columns, column))
        {
            return ColumnResult::denied(column, &rule.policy_name);
        }

        let mut includes = self
            .column_access
            .iter()
            .filter(|r| r.mode == ColumnsMode::Include)
            .peekable();

        let first_include = match includes.peek() {
            Some(rule) => rule.policy_name.clone(),
            None => return ColumnResult::allowed(column),
        };

        if includes.any(|r| matcher.matches_any_column(&r.columns, column)) {
            ColumnResult::allowed(column)
        } else {
            ColumnResult::denied(column, &first_include)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnResult {
    pub name: String,
    pub access: AccessDecision,
    /// Policy that denied the column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
}

impl ColumnResult {
    fn allowed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: AccessDecision::Allowed,
            policy_name: None,
        }
    }

    fn denied(name: &str, policy: &str) -> Self {
        Self {
            name: name.to_string(),
            access: AccessDecision::Denied,
            policy_name: Some(policy.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResult {
    pub table: Vec<String>,
    pub access: AccessDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<String>,
    pub row_filters: Vec<ResolvedRowFilter>,
    pub columns: Vec<ColumnResult>,
}

impl TableResult {
    pub fn is_denied(&self) -> bool {
        self.access == AccessDecision::Denied
    }

    pub fn allowed_columns(&self) -> Vec<&str> {
        self.columns_with(AccessDecision::Allowed)
    }

    pub fn denied_columns(&self) -> Vec<&str> {
        self.columns_with(AccessDecision::Denied)
    }

    fn columns_with(&self, access: AccessDecision) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.access == access)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyEvaluationResult {
    pub tables: Vec<TableResult>,
}

/// One table of an evaluation request, with the catalog's column list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRequest {
    pub table: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl TableRequest {
    pub fn new<T, C>(table: &[T], columns: &[C]) -> Self
    where
        T: AsRef<str>,
        C: AsRef<str>,
    {
        Self {
            table: table.iter().map(|s| s.as_ref().to_string()).collect(),
            columns: columns.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}
