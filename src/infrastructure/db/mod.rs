pub mod entities;
pub mod gateway;
pub mod migrations;
pub mod repositories;

use sea_orm::{
    ConnectOptions, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::{
    config::{DatabaseConfig, LockModeSetting},
    error::{AppError, Result},
};

pub use gateway::UnitOfWork;
use migrations::Migrator;

/// How mutations of shared rows are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockingMode {
    /// `SELECT ... FOR UPDATE` on read, version CAS on write.
    RowLock,
    /// Version CAS on write only.
    VersionCas,
}

impl LockingMode {
    pub fn resolve(setting: LockModeSetting, backend: DatabaseBackend) -> Result<Self> {
        let supports_row_locks = !matches!(backend, DatabaseBackend::Sqlite);

        match setting {
            LockModeSetting::Auto if supports_row_locks => Ok(Self::RowLock),
            LockModeSetting::Auto | LockModeSetting::VersionCas => Ok(Self::VersionCas),
            LockModeSetting::RowLock if supports_row_locks => Ok(Self::RowLock),
            LockModeSetting::RowLock => Err(AppError::InvalidParams(
                "DB_LOCK_MODE=row_lock is not supported by this database backend".into(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    connection: DatabaseConnection,
    lock_mode: LockingMode,
}

impl Database {
    pub async fn init_db(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ConnectOptions::new(&config.url);

        options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options).await?;
        let lock_mode = LockingMode::resolve(config.lock_mode, connection.get_database_backend())?;

        tracing::info!(lock_mode = ?lock_mode, "Database locking mode resolved");

        Ok(Self {
            connection,
            lock_mode,
        })
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn lock_mode(&self) -> LockingMode {
        self.lock_mode
    }

    pub async fn begin_transaction(&self) -> Result<DatabaseTransaction> {
        Ok(self.connection.begin().await?)
    }

    pub async fn unit_of_work(&self) -> Result<UnitOfWork> {
        let transaction = self.begin_transaction().await?;
        Ok(UnitOfWork::new(transaction, self.lock_mode))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        Ok(Migrator::up(&self.connection, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_never_claims_row_locks() {
        assert_eq!(
            LockingMode::resolve(LockModeSetting::Auto, DatabaseBackend::Sqlite).unwrap(),
            LockingMode::VersionCas
        );
        assert!(LockingMode::resolve(LockModeSetting::RowLock, DatabaseBackend::Sqlite).is_err());
    }

    #[test]
    fn postgres_defaults_to_row_locks() {
        assert_eq!(
            LockingMode::resolve(LockModeSetting::Auto, DatabaseBackend::Postgres).unwrap(),
            LockingMode::RowLock
        );
        assert_eq!(
            LockingMode::resolve(LockModeSetting::VersionCas, DatabaseBackend::Postgres).unwrap(),
            LockingMode::VersionCas
        );
    }
}
