#![forbid(unsafe_code)]
#![cfg_attr(
    not(feature = "libsql-backend"),
    doc = "Enable feature `libsql-backend` to use this adapter."
)]
//! LibSQL (SQLite) collaborators for colmap: a [`QueryExecutor`] that turns
//! rows into [`RawRecord`]s by column name, and a runner for ordered,
//! versioned schema migrations.
//!
//! [`QueryExecutor`]: colmap_core::QueryExecutor
//! [`RawRecord`]: colmap_core::RawRecord

/// One versioned schema change. `up` may hold several statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
}

impl Migration {
    pub const fn new(version: i64, description: &'static str, up: &'static str) -> Self {
        Self {
            version,
            description,
            up,
        }
    }
}

#[cfg(feature = "libsql-backend")]
mod backend {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Instant;

    use async_trait::async_trait;
    use colmap_core::{MapError, MapResult, QueryExecutor, RawRecord, Value};
    use libsql::{params, Database};

    use crate::Migration;

    #[cfg(feature = "tracing")]
    use tracing::{debug, info};

    /// Bookkeeping table recording applied migration versions.
    pub const HISTORY_TABLE: &str = "__colmap_migrations";

    #[inline]
    #[allow(unused_variables)]
    fn obs_record(op: &str, start: Instant, rows: usize, success: bool) {
        let elapsed = start.elapsed().as_millis() as u64;
        #[cfg(feature = "tracing")]
        {
            info!(
                op = op,
                rows = rows,
                elapsed_ms = elapsed,
                success = success,
                "libsql op"
            );
        }
        #[cfg(feature = "metrics")]
        {
            metrics::counter!(
                "colmap_queries_total", 1,
                "op" => op.to_string(), "success" => success.to_string()
            );
            metrics::histogram!(
                "colmap_query_duration_ms", elapsed as f64,
                "op" => op.to_string()
            );
        }
    }

    fn from_libsql_value(v: libsql::Value) -> Value {
        match v {
            libsql::Value::Null => Value::Null,
            libsql::Value::Integer(i) => Value::Integer(i),
            libsql::Value::Real(f) => Value::Real(f),
            libsql::Value::Text(s) => Value::Text(s),
            libsql::Value::Blob(b) => Value::Blob(b),
        }
    }

    fn to_record(row: &libsql::Row) -> MapResult<RawRecord> {
        let mut record = RawRecord::new();
        for idx in 0..row.column_count() {
            let name = row.column_name(idx).ok_or_else(|| MapError::Query {
                source: format!("result column {} has no name", idx).into(),
            })?;
            let value = row.get_value(idx).map_err(MapError::query)?;
            record.push(name, from_libsql_value(value));
        }
        Ok(record)
    }

    async fn collect_records(mut rows: libsql::Rows) -> MapResult<Vec<RawRecord>> {
        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(MapError::query)? {
            records.push(to_record(&row)?);
        }
        Ok(records)
    }

    fn open(path: &Path) -> MapResult<Database> {
        // Database::open is deprecated upstream; keep a narrow allow here until Builder migration
        #[allow(deprecated)]
        Database::open(path.display().to_string()).map_err(MapError::query)
    }

    /// Runs raw SQL against a libsql database and hands rows back as [`RawRecord`]s.
    #[derive(Clone)]
    pub struct LibsqlExecutor {
        db: Arc<Database>,
    }

    impl LibsqlExecutor {
        pub fn new(db: Arc<Database>) -> Self {
            Self { db }
        }

        /// Open (creating if needed) a local database file.
        pub fn open_file(path: impl AsRef<Path>) -> MapResult<Self> {
            Ok(Self::new(Arc::new(open(path.as_ref())?)))
        }

        pub fn database(&self) -> Arc<Database> {
            Arc::clone(&self.db)
        }
    }

    #[async_trait]
    impl QueryExecutor for LibsqlExecutor {
        async fn query(&self, sql: &str) -> MapResult<Vec<RawRecord>> {
            let start = Instant::now();
            let result = async {
                let conn = self.db.connect().map_err(MapError::query)?;
                let rows = conn.query(sql, ()).await.map_err(MapError::query)?;
                collect_records(rows).await
            }
            .await;
            match &result {
                Ok(records) => obs_record("query", start, records.len(), true),
                Err(_) => obs_record("query", start, 0, false),
            }
            result
        }
    }

    /// Applies [`Migration`]s in version order, each at most once per database.
    #[derive(Clone)]
    pub struct MigrationRunner {
        db: Arc<Database>,
    }

    impl MigrationRunner {
        pub fn new(db: Arc<Database>) -> Self {
            Self { db }
        }

        /// Apply every migration not yet recorded. Returns the versions applied
        /// by this call, ascending; an up-to-date database yields an empty list.
        pub async fn run(&self, migrations: &[Migration]) -> MapResult<Vec<i64>> {
            let mut ordered: Vec<&Migration> = migrations.iter().collect();
            ordered.sort_by_key(|m| m.version);
            if let Some(pair) = ordered.windows(2).find(|w| w[0].version == w[1].version) {
                return Err(MapError::configuration(format!(
                    "duplicate migration version {}",
                    pair[0].version
                )));
            }

            let conn = self.db.connect().map_err(MapError::query)?;
            ensure_history(&conn).await?;
            let done = applied_versions(&conn).await?;

            let mut newly_applied = Vec::new();
            for migration in ordered {
                if done.contains(&migration.version) {
                    #[cfg(feature = "tracing")]
                    debug!(version = migration.version, "migration already applied");
                    continue;
                }
                let start = Instant::now();
                let outcome = apply(&conn, migration).await;
                obs_record("migrate", start, 0, outcome.is_ok());
                outcome.map_err(|e| MapError::migration(migration.version, e))?;
                #[cfg(feature = "tracing")]
                info!(
                    version = migration.version,
                    description = migration.description,
                    "migration applied"
                );
                newly_applied.push(migration.version);
            }
            Ok(newly_applied)
        }

        /// Versions recorded in the history table, ascending.
        pub async fn applied(&self) -> MapResult<Vec<i64>> {
            let conn = self.db.connect().map_err(MapError::query)?;
            ensure_history(&conn).await?;
            applied_versions(&conn).await
        }
    }

    async fn ensure_history(conn: &libsql::Connection) -> MapResult<()> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (version INTEGER PRIMARY KEY, description TEXT NOT NULL, applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
                HISTORY_TABLE
            ),
            (),
        )
        .await
        .map_err(MapError::query)?;
        Ok(())
    }

    async fn applied_versions(conn: &libsql::Connection) -> MapResult<Vec<i64>> {
        let mut rows = conn
            .query(
                &format!("SELECT version FROM {} ORDER BY version", HISTORY_TABLE),
                (),
            )
            .await
            .map_err(MapError::query)?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await.map_err(MapError::query)? {
            versions.push(row.get::<i64>(0).map_err(MapError::query)?);
        }
        Ok(versions)
    }

    /// Run one migration and record it, all inside a single transaction.
    async fn apply(conn: &libsql::Connection, migration: &Migration) -> Result<(), libsql::Error> {
        conn.execute("BEGIN", ()).await?;
        let body = async {
            conn.execute_batch(migration.up).await?;
            conn.execute(
                &format!(
                    "INSERT INTO {} (version, description) VALUES (?1, ?2)",
                    HISTORY_TABLE
                ),
                params![migration.version, migration.description],
            )
            .await?;
            Ok::<(), libsql::Error>(())
        };
        match body.await {
            Ok(()) => {
                conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(e) => {
                conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }
}

#[cfg(feature = "libsql-backend")]
pub use backend::{LibsqlExecutor, MigrationRunner, HISTORY_TABLE};

#[cfg(all(test, feature = "libsql-backend"))]
mod tests {
    use super::*;
    use colmap_core::{MapError, QueryExecutor, Value};

    fn temp_executor() -> (tempfile::TempDir, LibsqlExecutor) {
        let dir = tempfile::tempdir().expect("tempdir");
        let exec = LibsqlExecutor::open_file(dir.path().join("colmap.sqlite3")).expect("open db");
        (dir, exec)
    }

    const CREATE: Migration = Migration::new(
        1,
        "create people",
        "CREATE TABLE people (person_id INTEGER PRIMARY KEY, full_name TEXT NOT NULL, score REAL, avatar BLOB);",
    );
    const SEED: Migration = Migration::new(
        2,
        "seed people",
        "INSERT INTO people (person_id, full_name, score, avatar) VALUES (1, 'hoge', 1.5, x'0102');\nINSERT INTO people (person_id, full_name) VALUES (2, 'fuga');",
    );
    const BROKEN: Migration = Migration::new(3, "broken", "INSERT INTO nowhere VALUES (1);");

    #[tokio::test]
    async fn query_returns_records_keyed_by_column_name() {
        let (_dir, exec) = temp_executor();
        MigrationRunner::new(exec.database())
            .run(&[CREATE, SEED])
            .await
            .expect("migrate");

        let rows = exec
            .query("SELECT * FROM people ORDER BY person_id")
            .await
            .expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].field_names().collect::<Vec<_>>(),
            ["person_id", "full_name", "score", "avatar"]
        );
        assert_eq!(rows[0].get("person_id"), Some(&Value::Integer(1)));
        assert_eq!(rows[0].get("full_name"), Some(&Value::Text("hoge".into())));
        assert_eq!(rows[0].get("score"), Some(&Value::Real(1.5)));
        assert_eq!(rows[0].get("avatar"), Some(&Value::Blob(vec![1, 2])));
        assert_eq!(rows[1].get("score"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn invalid_sql_surfaces_query_error() {
        let (_dir, exec) = temp_executor();
        let err = exec
            .query("SELECT * FROM does_not_exist")
            .await
            .expect_err("expected query to fail");
        assert!(matches!(err, MapError::Query { .. }));
    }

    #[tokio::test]
    async fn computed_columns_keep_their_expression_names() {
        let (_dir, exec) = temp_executor();
        let rows = exec
            .query("SELECT 1 + 1, 'x' AS label")
            .await
            .expect("query");
        assert_eq!(rows.len(), 1);
        let names: Vec<_> = rows[0].field_names().collect();
        assert_eq!(names, ["1 + 1", "label"]);
        assert_eq!(rows[0].get("1 + 1"), Some(&Value::Integer(2)));
    }

    #[tokio::test]
    async fn error_while_stepping_rows_is_a_query_error() {
        let (_dir, exec) = temp_executor();
        MigrationRunner::new(exec.database())
            .run(&[CREATE, SEED])
            .await
            .expect("migrate");
        // Row 1 converts fine; evaluating row 2 overflows.
        let err = exec
            .query(
                "SELECT CASE WHEN person_id = 2 THEN abs(-9223372036854775807 - 1) \
                 ELSE person_id END FROM people ORDER BY person_id",
            )
            .await
            .expect_err("overflow on second row");
        assert!(matches!(err, MapError::Query { .. }));
    }

    #[tokio::test]
    async fn migrations_apply_in_order_once() {
        let (_dir, exec) = temp_executor();
        let runner = MigrationRunner::new(exec.database());
        // Out of order on purpose; the runner sorts by version.
        let applied = runner.run(&[SEED, CREATE]).await.expect("first run");
        assert_eq!(applied, [1, 2]);
        let again = runner.run(&[CREATE, SEED]).await.expect("second run");
        assert!(again.is_empty());
        assert_eq!(runner.applied().await.unwrap(), [1, 2]);

        let rows = exec.query("SELECT * FROM people").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_versions_are_rejected_before_anything_runs() {
        let (_dir, exec) = temp_executor();
        let runner = MigrationRunner::new(exec.database());
        let dup = Migration::new(1, "again", "SELECT 1;");
        let err = runner.run(&[CREATE, dup]).await.expect_err("duplicate");
        assert!(matches!(err, MapError::Configuration { .. }));
        assert!(runner.applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_migration_is_rolled_back_and_reported() {
        let (_dir, exec) = temp_executor();
        let runner = MigrationRunner::new(exec.database());
        let err = runner
            .run(&[CREATE, SEED, BROKEN])
            .await
            .expect_err("broken migration");
        match err {
            MapError::Migration { version, .. } => assert_eq!(version, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.applied().await.unwrap(), [1, 2]);
    }
}
