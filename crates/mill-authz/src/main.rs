//! Mill authorization decision service
//!
//! Loads a policy document and answers evaluation requests, one JSON object
//! per line on stdin, one JSON result per line on stdout.

use std::io::{BufRead, Write};
use tracing::{error, info};

mod config;
mod logging;
mod service;

use config::Config;
use mill_policy::PolicyStore;
use service::DecisionService;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config_path = std::env::var("MILL_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;
    config.apply_logging_env();
    logging::init();

    let policy_path = config.policy.path();
    let format = config.policy.resolve_format()?;

    // A policy set that fails to load must never be replaced by an empty one
    let store = PolicyStore::default();
    if let Err(e) = store.reload_from(&policy_path, format) {
        error!(path = %policy_path.display(), error = %e, "initial policy load failed");
        return Err(e.into());
    }

    info!(
        config = %config_path,
        policies = store.current().len(),
        format = ?format,
        "mill-authz ready"
    );

    let service = DecisionService::new(store, policy_path, format);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if let Some(response) = service.handle_line(&line) {
            writeln!(out, "{}", response)?;
            out.flush()?;
        }
    }

    info!("input closed, shutting down");
    Ok(())
}
