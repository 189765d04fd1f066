//! Parley Database Crate
//!
//! Connection management, migrations and repositories for users, sessions,
//! chatrooms and messages.

use tracing::error;

use parley_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{ChatroomRepository, MessageRepository, UserRepository};

pub use entities::{AuthProvider, Chatroom, ChatroomMember, Message, NewMessage, User};

pub use types::{DatabaseError, DatabaseResult};

pub use sqlx::SqlitePool;

/// Connect to the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config).await.map_err(|e| {
        error!(error = %e, "database connection failed");
        DatabaseError::ConnectionError(format!("{e:#}"))
    })?;

    run_migrations(&pool).await.map_err(|e| {
        error!(error = %e, "database migration failed");
        DatabaseError::MigrationError(format!("{e:#}"))
    })?;

    Ok(pool)
}

/// Round-trip a trivial query to check the pool can reach the database.
pub async fn ping(pool: &SqlitePool) -> DatabaseResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Remove every row from every table, keeping the schema.
pub async fn clear_all(pool: &SqlitePool) -> DatabaseResult<()> {
    let mut tx = pool.begin().await?;
    for table in ["messages", "chatroom_members", "chatrooms", "sessions", "users"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
