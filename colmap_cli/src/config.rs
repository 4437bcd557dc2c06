use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "colmap_cli")]
#[command(about = "Map user_table rows onto a Rust struct with a chosen column-mapping strategy")]
pub struct CliConfig {
    /// SQLite database file; created and migrated on first run.
    #[arg(long, env = "COLMAP_DATABASE", default_value = "test.db")]
    pub database: String,

    /// Strategy key to use instead of prompting.
    #[arg(long)]
    pub strategy: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.database.trim().is_empty(),
            "--database must not be empty"
        );
        Ok(())
    }
}
