//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load an optional JSON config, start logging and open the registry.
//! - Print the registry version and active projects for quick sanity checks.

use featreg_core::{init_logging, RegistryConfig, RegistryService, SqliteRegistryRepository};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error");
            eprintln!("featreg: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => RegistryConfig::load(path).map_err(|err| err.to_string())?,
        None => RegistryConfig::default(),
    };
    init_logging(&config.logging).map_err(|err| err.to_string())?;

    let conn = config.open_database().map_err(|err| err.to_string())?;
    let repo = SqliteRegistryRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service =
        RegistryService::new(repo).with_max_apply_attempts(config.max_apply_retries);

    println!("featreg version={}", service.get_version());
    let projects = service.list_projects().map_err(|err| err.to_string())?;
    println!("featreg projects={}", projects.join(","));
    Ok(())
}
