//! JSON and YAML policy documents
//!
//! Export always writes the canonical `nodeType` expression shape. Import
//! accepts that shape, the hand-written shorthand understood by
//! [`mill_expr::parse`], and a plain string under `expression`, which is
//! kept as the raw expression.
//!
//! ```yaml
//! policies:
//!   - name: analysts
//!     actions:
//!       - verb: ALLOW
//!         type: row-filter
//!         table: [SALES, TRANSACTIONS]
//!         expression: "department = 'analytics'"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{ModelValidationError, PolicyError};
use crate::model::{ActionType, ActionVerb, ColumnsMode, Policy, PolicyActionEntry, PolicySet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Json,
    Yaml,
}

impl PolicyFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(PolicyFormat::Json),
            "yaml" | "yml" => Some(PolicyFormat::Yaml),
            _ => None,
        }
    }

    pub fn import_policies<R: Read>(&self, input: R) -> Result<PolicySet, PolicyError> {
        match self {
            PolicyFormat::Json => JsonPolicyImporter.import_policies(input),
            PolicyFormat::Yaml => YamlPolicyImporter.import_policies(input),
        }
    }

    pub fn export<W: Write>(&self, policies: &[Policy], output: W) -> Result<(), PolicyError> {
        match self {
            PolicyFormat::Json => JsonPolicyExporter::default().export(policies, output),
            PolicyFormat::Yaml => YamlPolicyExporter.export(policies, output),
        }
    }
}

pub trait PolicyImporter {
    fn import_policies<R: Read>(&self, input: R) -> Result<PolicySet, PolicyError>;
}

pub trait PolicyExporter {
    fn export<W: Write>(&self, policies: &[Policy], output: W) -> Result<(), PolicyError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPolicyImporter;

impl PolicyImporter for JsonPolicyImporter {
    fn import_policies<R: Read>(&self, input: R) -> Result<PolicySet, PolicyError> {
        let document: PolicyFileDocument = serde_json::from_reader(input)?;
        document.into_policy_set()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonPolicyExporter {
    pub pretty: bool,
}

impl Default for JsonPolicyExporter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl PolicyExporter for JsonPolicyExporter {
    fn export<W: Write>(&self, policies: &[Policy], output: W) -> Result<(), PolicyError> {
        let document = PolicyFileDocument::from_policies(policies)?;
        if self.pretty {
            serde_json::to_writer_pretty(output, &document)?;
        } else {
            serde_json::to_writer(output, &document)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlPolicyImporter;

impl PolicyImporter for YamlPolicyImporter {
    fn import_policies<R: Read>(&self, input: R) -> Result<PolicySet, PolicyError> {
        let document: PolicyFileDocument = serde_yaml::from_reader(input)?;
        document.into_policy_set()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlPolicyExporter;

impl PolicyExporter for YamlPolicyExporter {
    fn export<W: Write>(&self, policies: &[Policy], output: W) -> Result<(), PolicyError> {
        let document = PolicyFileDocument::from_policies(policies)?;
        serde_yaml::to_writer(output, &document)?;
        Ok(())
    }
}

/// SHA-256 of the canonical compact JSON export, hex encoded
pub fn fingerprint(policies: &[Policy]) -> Result<String, PolicyError> {
    let document = PolicyFileDocument::from_policies(policies)?;
    let bytes = serde_json::to_vec(&document)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Serialize, Deserialize)]
struct PolicyFileDocument {
    #[serde(default)]
    policies: Vec<PolicyDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PolicyDocument {
    name: String,
    #[serde(default)]
    actions: Vec<ActionDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ActionDocument {
    verb: ActionVerb,
    #[serde(rename = "type")]
    action_type: ActionType,
    table: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<Value>,
    #[serde(
        default,
        rename = "rawExpression",
        alias = "raw-expression",
        skip_serializing_if = "Option::is_none"
    )]
    raw_expression: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    exclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<String>>,
    #[serde(default, alias = "columnsMode", skip_serializing_if = "Option::is_none")]
    columns_mode: Option<ColumnsMode>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl PolicyFileDocument {
    fn from_policies(policies: &[Policy]) -> Result<Self, PolicyError> {
        let policies = policies
            .iter()
            .map(|policy| {
                Ok(PolicyDocument {
                    name: policy.name().to_string(),
                    actions: policy
                        .actions()
                        .iter()
                        .map(ActionDocument::from_entry)
                        .collect::<Result<_, PolicyError>>()?,
                })
            })
            .collect::<Result<_, PolicyError>>()?;
        Ok(Self { policies })
    }

    fn into_policy_set(self) -> Result<PolicySet, PolicyError> {
        let policies = self
            .policies
            .into_iter()
            .map(PolicyDocument::into_policy)
            .collect::<Result<Vec<_>, _>>()?;

        let set = PolicySet::new(policies)?;
        debug!(
            policies = set.len(),
            actions = set.action_count(),
            "imported policy document"
        );
        Ok(set)
    }
}

impl PolicyDocument {
    fn into_policy(self) -> Result<Policy, PolicyError> {
        let name = self.name;
        let actions = self
            .actions
            .into_iter()
            .enumerate()
            .map(|(index, action)| action.into_entry(&name, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Policy::new(name, actions)?)
    }
}

impl ActionDocument {
    fn from_entry(entry: &PolicyActionEntry) -> Result<Self, PolicyError> {
        let expression = entry.expression().map(serde_json::to_value).transpose()?;
        Ok(Self {
            verb: entry.verb(),
            action_type: entry.action_type(),
            table: entry.table().to_vec(),
            expression,
            raw_expression: entry.raw_expression().map(str::to_string),
            exclusive: entry.is_exclusive(),
            columns: entry.has_columns().then(|| entry.columns().to_vec()),
            columns_mode: entry.columns_mode(),
        })
    }

    fn into_entry(self, policy: &str, index: usize) -> Result<PolicyActionEntry, PolicyError> {
        let in_context = |source: ModelValidationError| ModelValidationError::InvalidAction {
            policy: policy.to_string(),
            index,
            source: Box::new(source),
        };

        let mut builder = PolicyActionEntry::builder(self.verb, self.action_type)
            .table(self.table.iter().cloned())
            .exclusive(self.exclusive);

        let mut raw_expression = self.raw_expression;
        match self.expression {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => {
                if raw_expression.is_some() {
                    return Err(in_context(ModelValidationError::ConflictingExpression(self.table.join("."))).into());
                }
                raw_expression = Some(text);
            }
            Some(value) => {
                let expression = mill_expr::parse(&value).map_err(|source| PolicyError::InvalidExpression {
                    policy: policy.to_string(),
                    index,
                    source,
                })?;
                builder = builder.expression(expression);
            }
        }

        if let Some(raw) = raw_expression {
            builder = builder.raw_expression(raw);
        }
        if let Some(columns) = self.columns {
            builder = builder.columns(columns);
        }
        if let Some(mode) = self.columns_mode {
            builder = builder.columns_mode(mode);
        }

        builder.build().map_err(|e| in_context(e).into())
    }
}
