use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;

use crate::apis::config as ai_config;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open (or create) `smart_models.db` under `workspace_dir`, migrate it and
/// seed the built-in provider configurations.
pub fn init_db(workspace_dir: PathBuf) -> Result<DbPool> {
    std::fs::create_dir_all(&workspace_dir)?;
    let db_path = workspace_dir.join("smart_models.db");
    let mgr = SqliteConnectionManager::file(&db_path);
    let pool = Pool::new(mgr)?;
    prepare(&pool)?;
    Ok(pool)
}

/// Single-connection in-memory database, mostly for tests and tooling.
pub fn init_in_memory() -> Result<DbPool> {
    let mgr = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(mgr)?;
    prepare(&pool)?;
    Ok(pool)
}

fn prepare(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;
    apply_migrations(&conn)?;
    ai_config::seed_defaults(&conn)?;
    Ok(())
}

pub(crate) fn apply_migrations(conn: &Connection) -> Result<()> {
    let migrations: &[(&str, &str)] = &[(
        "0001_smart_models.sql",
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/migrations/0001_smart_models.sql"
        )),
    )];

    for (name, sql) in migrations {
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration {name}"))?;
    }
    Ok(())
}
