//! Polling entry point for the foodlog agent.
//!
//! # Responsibility
//! - Load configuration, initialize logging, open the cache database.
//! - Run resolution cycles forever at the configured interval.

use foodlog_core::db::open_db;
use foodlog_core::{
    default_log_level, init_logging, Config, FoodAgent, LlmResolver, NotionStore,
    SqliteFoodRepository,
};
use log::{error, info};
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("foodlog: configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_from_config(&config) {
        eprintln!("foodlog: logging error: {err}");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=app_exit module=cli status=error detail={err}");
            eprintln!("foodlog: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_from_config(config: &Config) -> Result<(), String> {
    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = match &config.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_dir()?,
    };
    init_logging(&level, &log_dir)
}

fn default_log_dir() -> Result<String, String> {
    let dir = std::env::current_dir()
        .map_err(|err| format!("cannot determine working directory: {err}"))?
        .join("logs");
    dir.to_str()
        .map(str::to_string)
        .ok_or_else(|| "working directory is not valid UTF-8".to_string())
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(&config.db_path)?;
    let repo = SqliteFoodRepository::new(&conn);
    let remote = NotionStore::new(config.remote.clone())?;
    let resolver = LlmResolver::new(config.resolver.clone())?;
    let agent = FoodAgent::new(repo, remote, resolver)?;

    let interval = Duration::from_secs(config.poll_interval_secs);
    info!(
        "event=app_start module=cli status=ok version={} interval_secs={}",
        foodlog_core::core_version(),
        config.poll_interval_secs
    );

    loop {
        match agent.run_cycle() {
            Ok(report) => {
                if report.entries_seen > 0 {
                    info!(
                        "event=cycle module=cli status=ok seen={} completed={} failed={} skipped={}",
                        report.entries_seen,
                        report.entries_completed,
                        report.entries_failed,
                        report.entries_skipped
                    );
                }
            }
            // A failed cycle (remote outage, resolver outage) is retried at
            // the next tick; the process stays up.
            Err(err) => {
                error!("event=cycle module=cli status=error detail={err}");
            }
        }
        std::thread::sleep(interval);
    }
}
