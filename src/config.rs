// Runtime configuration shared by the CLI and the HTTP server
//
// Every setting can come from a flag or an environment variable.

use clap::Args;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// SQLite database file
    #[arg(long = "db", env = "FOOD_DONATION_DB", default_value = "food_donation.db")]
    pub database: PathBuf,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = "FOOD_DONATION_LOG", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Config {
    /// Install `simple_logger` at the configured level
    pub fn init_logging(&self) -> anyhow::Result<()> {
        simple_logger::SimpleLogger::new()
            .with_level(self.log_level)
            .init()?;
        Ok(())
    }
}
