use anyhow::Result;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::path::Path;

// Migrations are embedded so the binary does not depend on finding a
// migrations directory relative to the working directory at runtime.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Open (creating if needed) the SQLite database at `db_path`, apply pending
/// migrations, and return a connection pool.
pub fn establish_pool(db_path: &Path) -> Result<Pool> {
    let database_url = format!("sqlite://{}", db_path.to_string_lossy());
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder().max_size(4).build(manager)?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }
    Ok(pool)
}

fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("migration error: {e}"))
}
