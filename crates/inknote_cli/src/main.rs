//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `inknote_core` linkage and that the configured store opens.
//! - Keep output deterministic `key=value` lines for quick sanity checks.

use inknote_core::{init_logging, CoreConfig, Storage};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("inknote error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let mut storage = Storage::new();
    storage.initialize(&config.db_path)?;
    log::info!("event=cli_status module=cli status=start");

    println!("inknote_core version={}", inknote_core::core_version());
    println!("db_path={}", config.db_path.display());
    println!("documents={}", storage.document_count()?);
    println!("pages={}", storage.page_count()?);
    println!("db_size_bytes={}", storage.database_size()?);

    storage.close();
    log::info!("event=cli_status module=cli status=ok");
    Ok(())
}
