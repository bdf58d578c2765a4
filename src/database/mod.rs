//! Database access layer.
//!
//! Directory lookups (users, departments) go through DAOs; the transactional
//! ledger operations live in the quota and permission services, which open
//! their own transaction scopes on the shared connection.

use sea_orm::DatabaseConnection;
use thiserror::Error;

pub mod dao;
pub mod entities;
pub mod migration;

pub use dao::{EmployeesDao, UsersDao};

/// Database error types
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Database(String),
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("migration error: {0}")]
    Migration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database connection manager
pub struct DatabaseManager {
    pub connection: DatabaseConnection,
}

impl DatabaseManager {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub async fn new_from_config(config: &crate::config::Config) -> Result<Self, DatabaseError> {
        let connection = sea_orm::Database::connect(&config.database.url)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;
        Ok(Self::new(connection))
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        use crate::database::migration::Migrator;
        use sea_orm_migration::MigratorTrait;

        tracing::info!("Running database migrations");

        Migrator::up(&self.connection, None)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Successfully completed all migrations");
        Ok(())
    }

    /// Health check for database connection
    pub async fn health_check(&self) -> DatabaseResult<()> {
        use crate::database::entities::quotas;
        use sea_orm::{EntityTrait, PaginatorTrait};

        let _count = quotas::Entity::find()
            .count(&self.connection)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get users DAO
    pub fn users(&self) -> UsersDao {
        UsersDao::new(self.connection.clone())
    }

    /// Get employee departments DAO
    pub fn employees(&self) -> EmployeesDao {
        EmployeesDao::new(self.connection.clone())
    }
}
