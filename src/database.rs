use crate::{config::DatabaseConfig, error::DatabaseError};
use diesel::{
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection},
    sqlite::Sqlite,
    SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection. Writers wait on the busy timeout instead of
/// failing with SQLITE_BUSY, which the conditional updates rely on under contention.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, connection: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        connection
            .batch_execute(&format!(
                "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
                self.busy_timeout_ms
            ))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn build_pool(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    let manager = ConnectionManager::<SqliteConnection>::new(&config.url);
    Ok(Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?)
}

pub fn run_migrations(
    connection: &mut impl MigrationHarness<Sqlite>,
    embedded_migrations: EmbeddedMigrations,
) -> Result<(), DatabaseError> {
    connection
        .run_pending_migrations(embedded_migrations)
        .map_err(|err| DatabaseError::Migration(err.to_string()))?;
    Ok(())
}

/// Builds the pool and brings the schema up to date.
pub fn establish_pool(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    let pool = build_pool(config)?;
    let mut connection: DbConnection = pool.get()?;
    run_migrations(&mut *connection, MIGRATIONS)?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    )
}

pub(crate) fn is_foreign_key_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ForeignKeyViolation,
            _
        )
    )
}
