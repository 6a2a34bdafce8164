//! Line-oriented decision protocol
//!
//! Each input line is one JSON request, each output line one JSON response:
//!
//! ```text
//! {"op":"evaluate","policies":["analysts"],"table":["SALES","CLIENT"],"columns":["id","pii_ssn"]}
//! {"op":"evaluate","policies":["analysts"],"tables":[{"table":["HR","SALARY"]}]}
//! {"op":"reload"}
//! ```

use mill_policy::{PolicyActionResolver, PolicyEvaluationResult, PolicyFormat, PolicyStore, TableRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, Level};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Evaluate(EvaluateRequest),
    Reload,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// Active policy names of the principal
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub table: Option<Vec<String>>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub tables: Vec<TableRequest>,
}

impl EvaluateRequest {
    fn table_requests(self) -> Vec<TableRequest> {
        let mut requests = Vec::with_capacity(self.tables.len() + 1);
        if let Some(table) = self.table {
            requests.push(TableRequest {
                table,
                columns: self.columns,
            });
        }
        requests.extend(self.tables);
        requests
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Decision(PolicyEvaluationResult),
    Reloaded { reloaded: bool, fingerprint: String },
    Error { error: String },
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Response::Error { error: message.into() }
    }
}

pub struct DecisionService {
    store: PolicyStore,
    policy_path: PathBuf,
    format: PolicyFormat,
}

impl DecisionService {
    pub fn new(store: PolicyStore, policy_path: PathBuf, format: PolicyFormat) -> Self {
        Self {
            store,
            policy_path,
            format,
        }
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Handle one request line; blank lines produce no response
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(e) => Response::error(format!("invalid request: {}", e)),
        };

        let encoded = serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode response: {}"}}"#, e));
        Some(encoded)
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Evaluate(request) => Response::Decision(self.evaluate(request)),
            Request::Reload => match self.store.reload_from(&self.policy_path, self.format) {
                Ok(fingerprint) => Response::Reloaded {
                    reloaded: true,
                    fingerprint,
                },
                Err(e) => Response::error(e.to_string()),
            },
        }
    }

    fn evaluate(&self, mut request: EvaluateRequest) -> PolicyEvaluationResult {
        let policies = self.store.current();
        let active = std::mem::take(&mut request.policies);
        let requests = request.table_requests();

        let resolver = PolicyActionResolver::new(&policies, active.iter().map(String::as_str));
        let result = resolver.evaluate_tables(&active, &requests);

        let denied = result.tables.iter().filter(|t| t.is_denied()).count();
        crate::log_event!(
            level: Level::INFO,
            event: "decision",
            policies: active,
            tables: result.tables.len(),
            denied: denied
        );
        debug!(
            row_filters = result.tables.iter().map(|t| t.row_filters.len()).sum::<usize>(),
            "decision detail"
        );

        result
    }
}
