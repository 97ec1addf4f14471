pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::ensure_default_config;
use crate::models::TimeFormat;
use crate::time_service::TimeService;

pub use watch::watch_command;

/// `timedate now`: print one snapshot as JSON.
pub fn now_command(timezone: &str, format: TimeFormat) -> Result<()> {
    let snapshot = TimeService::new()
        .current_time(timezone, format)
        .with_context(|| format!("Cannot render time for {:?}", timezone))?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    println!("{}", json);
    Ok(())
}

/// `timedate init-config`: write the default config file if it is missing.
pub fn init_config_command(path: &Path) -> Result<()> {
    if ensure_default_config(path)? {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists, leaving it unchanged", path.display());
    }
    Ok(())
}
