//! Policy action resolver
//!
//! Resolution runs in two passes. The first collects every action whose table
//! pattern matches the target; the second applies fixed precedence rules, so
//! the order of policies in the set never changes a decision:
//!
//! - table access: any DENY from an active policy denies, otherwise allowed
//! - row filters: active policies contribute their filter as-is; exclusive
//!   filters of inactive policies contribute their complement
//! - columns: see [`ResolvedActions::column_decision`]

use mill_expr::ExpressionNode;
use std::collections::HashSet;
use tracing::debug;

use crate::evaluation::{
    AccessDecision, PolicyEvaluationResult, ResolvedActions, ResolvedColumnAccess, ResolvedRowFilter,
    TableRequest, TableResult,
};
use crate::matcher::PolicyMatcher;
use crate::model::{ActionType, ActionVerb, PolicyActionEntry, PolicySet};

pub struct PolicyActionResolver<'a> {
    policy_set: &'a PolicySet,
    selected: HashSet<String>,
    matcher: PolicyMatcher,
}

impl<'a> PolicyActionResolver<'a> {
    /// Resolver bound to the policies active for one principal
    pub fn new<I, S>(policy_set: &'a PolicySet, selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            policy_set,
            selected: selected.into_iter().map(Into::into).collect(),
            matcher: PolicyMatcher::new(),
        }
    }

    pub fn selected(&self) -> &HashSet<String> {
        &self.selected
    }

    /// Row and column oriented view of one table for the bound principal
    pub fn resolve<T: AsRef<str>>(&self, table: &[T]) -> ResolvedActions {
        self.collect(&self.selected, table)
    }

    /// Full decision for one table under an explicit active policy set
    pub fn evaluate<I, S, T, C>(&self, active: I, table: &[T], columns: &[C]) -> PolicyEvaluationResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        T: AsRef<str>,
        C: AsRef<str>,
    {
        self.evaluate_tables(active, &[TableRequest::new(table, columns)])
    }

    /// Decisions for several tables, in request order
    pub fn evaluate_tables<I, S>(&self, active: I, requests: &[TableRequest]) -> PolicyEvaluationResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let active: HashSet<String> = active
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .filter(|name| self.policy_set.contains(name))
            .collect();

        let tables = requests
            .iter()
            .map(|request| {
                let resolved = self.collect(&active, &request.table);
                let columns = request
                    .columns
                    .iter()
                    .map(|column| resolved.column_decision(column))
                    .collect();

                TableResult {
                    table: resolved.table,
                    access: resolved.table_access,
                    denied_by: resolved.denied_by,
                    row_filters: resolved.row_filters,
                    columns,
                }
            })
            .collect();

        PolicyEvaluationResult { tables }
    }

    fn collect<T: AsRef<str>>(&self, active: &HashSet<String>, table: &[T]) -> ResolvedActions {
        let mut denials = Vec::new();
        let mut row_filters = Vec::new();
        let mut column_access = Vec::new();

        for policy in self.policy_set {
            let member = active.contains(policy.name());

            for action in policy.actions() {
                if !self.matcher.matches_table(action.table(), table) {
                    continue;
                }

                match action.action_type() {
                    ActionType::TableAccess => {
                        if member && action.verb() == ActionVerb::Deny {
                            denials.push(policy.name().to_string());
                        }
                    }
                    ActionType::RowFilter => {
                        if member {
                            row_filters.push(row_filter(policy.name(), action, false));
                        } else if action.is_exclusive() {
                            row_filters.push(row_filter(policy.name(), action, true));
                        }
                    }
                    ActionType::ColumnAccess => {
                        if let (true, Some(mode)) = (member, action.columns_mode()) {
                            column_access.push(ResolvedColumnAccess {
                                policy_name: policy.name().to_string(),
                                verb: action.verb(),
                                mode,
                                columns: action.columns().to_vec(),
                            });
                        }
                    }
                }
            }
        }

        let table_access = if denials.is_empty() {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        };
        let table: Vec<String> = table.iter().map(|s| s.as_ref().to_string()).collect();

        debug!(
            table = %table.join("."),
            access = ?table_access,
            row_filters = row_filters.len(),
            column_rules = column_access.len(),
            "resolved policy actions"
        );

        ResolvedActions {
            table,
            table_access,
            denied_by: denials.into_iter().next(),
            row_filters,
            column_access,
        }
    }
}

fn row_filter(policy_name: &str, action: &PolicyActionEntry, negate: bool) -> ResolvedRowFilter {
    let (expression, raw_expression) = if negate {
        complement(action.expression(), action.raw_expression())
    } else {
        (action.expression().cloned(), action.raw_expression().map(str::to_string))
    };

    ResolvedRowFilter {
        policy_name: policy_name.to_string(),
        verb: action.verb(),
        expression,
        raw_expression,
        negated: negate,
    }
}

/// Negate both representations of a filter together
fn complement(expression: Option<&ExpressionNode>, raw: Option<&str>) -> (Option<ExpressionNode>, Option<String>) {
    let expression = expression.map(|e| ExpressionNode::not(e.clone()));
    let raw = raw.map(|r| {
        if r.trim().is_empty() {
            r.to_string()
        } else {
            format!("NOT ({})", r)
        }
    });
    (expression, raw)
}
