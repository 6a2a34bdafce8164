//! Hot-swappable policy set
//!
//! Readers take a cheap `Arc` snapshot; a reload builds a complete new set
//! and only then swaps it in. A reload that fails leaves the previous set
//! in place.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::error::PolicyError;
use crate::io::{fingerprint, PolicyFormat};
use crate::model::PolicySet;

/// Read and validate a policy file
pub fn load_file(path: impl AsRef<Path>, format: PolicyFormat) -> Result<PolicySet, PolicyError> {
    let file = File::open(path.as_ref())?;
    format.import_policies(BufReader::new(file))
}

#[derive(Debug, Default)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    pub fn new(policies: PolicySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(policies)),
        }
    }

    /// Snapshot of the active policy set
    pub fn current(&self) -> Arc<PolicySet> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, policies: PolicySet) {
        let next = Arc::new(policies);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Load `path` and swap it in, returning the new fingerprint
    pub fn reload_from(&self, path: impl AsRef<Path>, format: PolicyFormat) -> Result<String, PolicyError> {
        let path = path.as_ref();
        let loaded = load_file(path, format).and_then(|set| {
            let digest = fingerprint(set.policies())?;
            Ok((set, digest))
        });

        match loaded {
            Ok((set, digest)) => {
                info!(
                    path = %path.display(),
                    policies = set.len(),
                    actions = set.action_count(),
                    fingerprint = %digest,
                    "policy set loaded"
                );
                self.replace(set);
                Ok(digest)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    kept = self.current().len(),
                    "policy reload failed, keeping previous policy set"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mill_policy_store_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_empty_store() {
        let store = PolicyStore::default();
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_reload_swaps_set() {
        let path = temp_file(
            "good.yaml",
            "policies:\n  - name: restricted\n    actions:\n      - verb: DENY\n        type: table-access\n        table: [HR, SALARY]\n",
        );

        let store = PolicyStore::default();
        let before = store.current();
        let digest = store.reload_from(&path, PolicyFormat::Yaml).unwrap();

        assert_eq!(digest.len(), 64);
        assert!(store.current().contains("restricted"));
        assert!(before.is_empty());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_failed_reload_keeps_previous_set() {
        let good = temp_file(
            "keep_good.json",
            r#"{"policies": [{"name": "analysts", "actions": []}]}"#,
        );
        let bad = temp_file(
            "keep_bad.json",
            r#"{"policies": [{"name": "analysts"}, {"name": "analysts"}]}"#,
        );

        let store = PolicyStore::default();
        store.reload_from(&good, PolicyFormat::Json).unwrap();
        assert!(store.reload_from(&bad, PolicyFormat::Json).is_err());
        assert!(store.reload_from("/nonexistent/policies.json", PolicyFormat::Json).is_err());

        let current = store.current();
        assert_eq!(current.len(), 1);
        assert!(current.contains("analysts"));

        std::fs::remove_file(good).ok();
        std::fs::remove_file(bad).ok();
    }
}
