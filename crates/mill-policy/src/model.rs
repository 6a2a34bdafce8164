//! Policy data model
//!
//! Entries, policies and policy sets are validated once when built and are
//! read-only afterwards. A reload replaces the whole [`PolicySet`].

use mill_expr::ExpressionNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ModelValidationError;
use crate::matcher::WILDCARD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionVerb {
    #[serde(alias = "allow")]
    Allow,
    #[serde(alias = "deny")]
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    #[serde(alias = "TABLE_ACCESS")]
    TableAccess,
    #[serde(alias = "ROW_FILTER")]
    RowFilter,
    #[serde(alias = "COLUMN_ACCESS")]
    ColumnAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnsMode {
    #[serde(alias = "INCLUDE")]
    Include,
    #[serde(alias = "EXCLUDE")]
    Exclude,
}

/// A single rule of a policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyActionEntry {
    verb: ActionVerb,
    action_type: ActionType,
    table: Vec<String>,
    expression: Option<ExpressionNode>,
    raw_expression: Option<String>,
    exclusive: bool,
    columns: Option<Vec<String>>,
    columns_mode: Option<ColumnsMode>,
}

impl PolicyActionEntry {
    pub fn builder(verb: ActionVerb, action_type: ActionType) -> PolicyActionEntryBuilder {
        PolicyActionEntryBuilder {
            verb,
            action_type,
            table: Vec::new(),
            expression: None,
            raw_expression: None,
            exclusive: false,
            columns: None,
            columns_mode: None,
        }
    }

    pub fn verb(&self) -> ActionVerb {
        self.verb
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Qualified table pattern; the last segment may be `*`
    pub fn table(&self) -> &[String] {
        &self.table
    }

    pub fn expression(&self) -> Option<&ExpressionNode> {
        self.expression.as_ref()
    }

    pub fn raw_expression(&self) -> Option<&str> {
        self.raw_expression.as_deref()
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn columns(&self) -> &[String] {
        self.columns.as_deref().unwrap_or(&[])
    }

    pub fn columns_mode(&self) -> Option<ColumnsMode> {
        self.columns_mode
    }

    /// True when a structured expression or a non-blank raw expression exists
    pub fn has_expression(&self) -> bool {
        self.expression.is_some() || has_text(self.raw_expression.as_deref())
    }

    pub fn has_columns(&self) -> bool {
        self.columns.as_ref().is_some_and(|c| !c.is_empty())
    }
}

pub struct PolicyActionEntryBuilder {
    verb: ActionVerb,
    action_type: ActionType,
    table: Vec<String>,
    expression: Option<ExpressionNode>,
    raw_expression: Option<String>,
    exclusive: bool,
    columns: Option<Vec<String>>,
    columns_mode: Option<ColumnsMode>,
}

impl PolicyActionEntryBuilder {
    pub fn table<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn expression(mut self, expression: ExpressionNode) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn raw_expression(mut self, raw: impl Into<String>) -> Self {
        self.raw_expression = Some(raw.into());
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Column patterns; an empty list is the same as none
    pub fn columns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        self.columns = (!patterns.is_empty()).then_some(patterns);
        self
    }

    pub fn columns_mode(mut self, mode: ColumnsMode) -> Self {
        self.columns_mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<PolicyActionEntry, ModelValidationError> {
        if self.table.is_empty() {
            return Err(ModelValidationError::EmptyTable);
        }
        let last = self.table.len() - 1;
        if self.table[..last].iter().any(|segment| segment == WILDCARD) {
            return Err(ModelValidationError::MisplacedWildcard(self.table.join(".")));
        }

        let entry = PolicyActionEntry {
            verb: self.verb,
            action_type: self.action_type,
            table: self.table,
            expression: self.expression,
            raw_expression: self.raw_expression,
            exclusive: self.exclusive,
            columns: self.columns,
            columns_mode: self.columns_mode,
        };

        match entry.action_type {
            ActionType::RowFilter if !entry.has_expression() => {
                Err(ModelValidationError::MissingExpression(entry.table.join(".")))
            }
            ActionType::ColumnAccess if !entry.has_columns() => {
                Err(ModelValidationError::MissingColumns(entry.table.join(".")))
            }
            ActionType::ColumnAccess if entry.columns_mode.is_none() => {
                Err(ModelValidationError::MissingColumnsMode(entry.table.join(".")))
            }
            _ => Ok(entry),
        }
    }
}

/// A named, ordered list of actions
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    name: String,
    actions: Vec<PolicyActionEntry>,
}

impl Policy {
    pub fn new(name: impl Into<String>, actions: Vec<PolicyActionEntry>) -> Result<Self, ModelValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelValidationError::EmptyPolicyName);
        }
        Ok(Self { name, actions })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[PolicyActionEntry] {
        &self.actions
    }
}

/// Immutable snapshot of all known policies, in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
    by_name: HashMap<String, usize>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>) -> Result<Self, ModelValidationError> {
        let mut by_name = HashMap::with_capacity(policies.len());
        for (i, policy) in policies.iter().enumerate() {
            if by_name.insert(policy.name.clone(), i).is_some() {
                return Err(ModelValidationError::DuplicatePolicy(policy.name.clone()));
            }
        }
        Ok(Self { policies, by_name })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Policy> {
        self.policies.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.by_name.get(name).map(|&i| &self.policies[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Total number of actions across all policies
    pub fn action_count(&self) -> usize {
        self.policies.iter().map(|p| p.actions.len()).sum()
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a Policy;
    type IntoIter = std::slice::Iter<'a, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}
