use std::io::{BufRead, Write};

use anyhow::Context;
use colmap::backends::{LibsqlExecutor, Migration, MigrationRunner};
use colmap::{fetch_all, MappingConfig, MappingResolver, StrategyCatalog};
use tracing::{debug, info, warn};

use crate::config::{CliConfig, OutputFormat};
use crate::model::User;
use crate::strategies;

pub const MIGRATIONS: [Migration; 1] = [Migration::new(
    1,
    "create and seed user_table",
    include_str!("../migrations/001_user_table.sql"),
)];

const SELECT_USERS: &str = "SELECT * FROM user_table";

/// Writes human-facing text. In JSON mode stdout carries data only, so
/// messages go to the log instead.
struct Console<'a, W: Write> {
    out: &'a mut W,
    format: OutputFormat,
}

impl<'a, W: Write> Console<'a, W> {
    fn say(&mut self, message: &str) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{message}"),
            OutputFormat::Json => {
                info!("{message}");
                Ok(())
            }
        }
    }

    fn menu(&mut self, catalog: &StrategyCatalog) -> std::io::Result<()> {
        self.say("")?;
        self.say("Which mapping should be used?")?;
        for (key, description) in catalog.entries() {
            self.say(&format!("{key} - {description}"))?;
        }
        self.out.flush()
    }

    fn users(&mut self, users: &[User]) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Text => {
                for u in users {
                    writeln!(self.out, "User ID: {}, User name: {}", u.user_id, u.user_name)?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut *self.out, users)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }
}

/// Query `user_table` and keep only the rows that materialize.
async fn query_users(
    executor: &LibsqlExecutor,
    config: MappingConfig,
) -> anyhow::Result<Vec<User>> {
    let resolver = MappingResolver::new(config);
    let rows = fetch_all::<User, _>(executor, &resolver, SELECT_USERS)
        .await
        .context("querying user_table")?;
    let total = rows.len();
    let users: Vec<User> = rows
        .into_iter()
        .filter_map(|row| match row {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "row skipped");
                None
            }
        })
        .collect();
    debug!(total, mapped = users.len(), "user_table fetched");
    Ok(users)
}

fn read_key<R: BufRead>(input: &mut R) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("reading strategy key")?;
    Ok(line.trim().to_string())
}

/// Migrate, show the unmapped result, then map with the chosen strategy.
/// An unknown key ends the run without error.
pub async fn run<R: BufRead, W: Write>(
    config: &CliConfig,
    mut input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    let executor = LibsqlExecutor::open_file(&config.database)
        .with_context(|| format!("opening database {}", config.database))?;
    let applied = MigrationRunner::new(executor.database())
        .run(&MIGRATIONS)
        .await
        .context("running migrations")?;
    info!(?applied, database = %config.database, "schema ready");

    let catalog = strategies::catalog()?;
    let mut console = Console {
        out,
        format: config.format,
    };

    console.say("Without any mapping, no rows are displayed.")?;
    let unmapped = query_users(&executor, MappingConfig::new()).await?;
    console.users(&unmapped)?;

    console.menu(&catalog)?;
    let key = match &config.strategy {
        Some(key) => key.clone(),
        None => read_key(&mut input)?,
    };
    if !catalog.contains(&key) {
        info!(key = %key, "no strategy under this key, exiting");
        return Ok(());
    }

    let mut mapping = MappingConfig::new();
    catalog.apply(&key, &mut mapping)?;
    console.say("")?;
    let users = query_users(&executor, mapping).await?;
    console.users(&users)?;
    console.say("Rows are mapped.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config(dir: &tempfile::TempDir, strategy: Option<&str>, format: OutputFormat) -> CliConfig {
        CliConfig {
            database: dir.path().join("test.db").display().to_string(),
            strategy: strategy.map(str::to_string),
            format,
            verbose: false,
        }
    }

    async fn run_to_string(cfg: &CliConfig, input: &str) -> String {
        let mut out = Vec::new();
        run(cfg, Cursor::new(input.to_string()), &mut out)
            .await
            .expect("run");
        String::from_utf8(out).expect("utf8")
    }

    const MAPPED: &str = "User ID: 1, User name: hoge\nUser ID: 2, User name: fuga\n";

    #[tokio::test]
    async fn each_strategy_maps_seeded_rows() {
        for key in ["1", "2", "3"] {
            let dir = tempfile::tempdir().unwrap();
            let text = run_to_string(&config(&dir, Some(key), OutputFormat::Text), "").await;
            assert!(text.contains(MAPPED), "strategy {key}: {text}");
            assert!(text.ends_with("Rows are mapped.\n"));
            // Only the mapped pass prints rows.
            assert_eq!(text.matches("User ID:").count(), 2);
        }
    }

    #[tokio::test]
    async fn key_is_read_from_input_when_not_given() {
        let dir = tempfile::tempdir().unwrap();
        let text = run_to_string(&config(&dir, None, OutputFormat::Text), "3\n").await;
        assert!(text.starts_with("Without any mapping, no rows are displayed.\n"));
        assert!(text.contains("1 - explicit map for User"));
        assert!(text.contains(MAPPED));
    }

    #[tokio::test]
    async fn unknown_key_exits_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let text = run_to_string(&config(&dir, None, OutputFormat::Text), "q\n").await;
        assert!(!text.contains("User ID:"));
        assert!(!text.contains("Rows are mapped."));
    }

    #[tokio::test]
    async fn json_output_is_data_only() {
        let dir = tempfile::tempdir().unwrap();
        let text = run_to_string(&config(&dir, Some("1"), OutputFormat::Json), "").await;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[]");
        let users: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(
            users,
            serde_json::json!([
                {"user_id": 1, "user_name": "hoge"},
                {"user_id": 2, "user_name": "fuga"}
            ])
        );
    }

    #[tokio::test]
    async fn second_run_reuses_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, Some("2"), OutputFormat::Text);
        run_to_string(&cfg, "").await;
        let text = run_to_string(&cfg, "").await;
        assert_eq!(text.matches("User ID:").count(), 2);
    }
}
