use anyhow::{Context, Result};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{Connection, PgConnection};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn establish_pg_connection() -> Result<PgConnection> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    PgConnection::establish(&database_url)
        .with_context(|| format!("Failed to connect to database at {}", database_url))
}

pub fn create_conn() -> Result<DbPool> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://finuser:@localhost:5432/finserver".to_string());
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .build(manager)
        .context("Failed to create database pool")
}
