//! Process configuration. Loaded once at startup from the environment
//! (teacher's `dotenv::dotenv().ok()` then `std::env::var` bootstrap order).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceDriver {
    File,
    Db,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub persistence_driver: PersistenceDriver,
    pub model_hr_data_dir: PathBuf,
    pub model_hr_db_path: PathBuf,
    pub runs_data_dir: PathBuf,
    pub observations_cap: usize,
    pub signals_retention_days: i64,
    pub actions_retention_days: i64,
    pub ledger_max_decisions: usize,
    pub ledger_max_runs: usize,
    pub portfolio_cache_ttl: Duration,
    pub worker_concurrency: usize,
    pub qa_concurrency: usize,
    pub materialize_deliverable_git_commit: bool,
    pub bind_addr: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("resolve cwd")?;

        let persistence_driver = match env_or("PERSISTENCE_DRIVER", "file").as_str() {
            "db" => PersistenceDriver::Db,
            "file" => PersistenceDriver::File,
            other => anyhow::bail!("invalid PERSISTENCE_DRIVER={other:?}, expected file|db"),
        };

        Ok(Self {
            persistence_driver,
            model_hr_data_dir: std::env::var("MODEL_HR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join(".data").join("model-hr")),
            model_hr_db_path: std::env::var("MODEL_HR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join(".data").join("model-hr.sqlite3")),
            runs_data_dir: std::env::var("RUNS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join(".data").join("runs")),
            observations_cap: env_parse("MODEL_HR_OBSERVATIONS_CAP", 500usize)?,
            signals_retention_days: env_parse("MODEL_HR_SIGNALS_RETENTION_DAYS", 14i64)?,
            actions_retention_days: env_parse("MODEL_HR_ACTIONS_RETENTION_DAYS", 14i64)?,
            ledger_max_decisions: env_parse("LEDGER_MAX_DECISIONS", 200usize)?,
            ledger_max_runs: env_parse("LEDGER_MAX_RUNS", 200usize)?,
            portfolio_cache_ttl: Duration::from_secs(env_parse(
                "PORTFOLIO_CACHE_TTL_SECS",
                60u64,
            )?),
            worker_concurrency: env_parse("WORKER_CONCURRENCY", 3usize)?,
            qa_concurrency: env_parse("QA_CONCURRENCY", 2usize)?,
            materialize_deliverable_git_commit: std::env::var(
                "MATERIALIZE_DELIVERABLE_GIT_COMMIT",
            )
            .is_ok(),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

/// Initialise the global `tracing` subscriber.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("model_agency_core=debug,tower_http=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_env() {
        // SAFETY (test-only): no other test in this process races on these vars.
        std::env::remove_var("PERSISTENCE_DRIVER");
        std::env::remove_var("PORTFOLIO_CACHE_TTL_SECS");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.persistence_driver, PersistenceDriver::File);
        assert_eq!(cfg.portfolio_cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn invalid_persistence_driver_fails_fast() {
        std::env::set_var("PERSISTENCE_DRIVER", "carrier-pigeon");
        let result = Config::from_env();
        std::env::remove_var("PERSISTENCE_DRIVER");
        assert!(result.is_err());
    }
}
