//! For interacting with the database.
//!
//! Every request works inside a single [`UnitOfWork`], which is either a
//! PostgreSQL transaction or an exclusive, staged view of the in-memory
//! tables. Nothing a unit of work does is visible to others until
//! [`UnitOfWork::commit`] is called, and dropping it rolls back.

use super::{
    config::{Backend, Config, DatabaseConfig, UserConfig},
    error::ApiResult,
    memory::{MemoryDb, MemoryTx},
};
use crate::feature::user::user_repository::{self, UserStore};
use sqlx::{
    migrate::Migrator,
    pool::PoolOptions,
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions, PgPool, Postgres, Transaction,
};
use std::time::Duration;
use tracing::{instrument, log::LevelFilter};

/// A common transaction type.
/// Use this for the business and persistence layer.
pub type Tx = Transaction<'static, Postgres>;

/// A common database pool type.
pub type DbPool = PgPool;

/// The schema migrations shipped with the service.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Connects to the database based on some configuration.
pub fn init_db(config: &DatabaseConfig) -> PgPool {
    let db_options = PgConnectOptions::default()
        .username(&config.username)
        .password(&config.password)
        .host(&config.host)
        .port(config.port)
        .database(&config.database_name)
        .ssl_mode(PgSslMode::Prefer)
        .log_statements(LevelFilter::Debug);
    PoolOptions::default()
        .acquire_timeout(Duration::from_secs(5))
        .min_connections(1)
        .max_connections(config.max_connections)
        .connect_lazy_with(db_options)
}

/// The store backing items and users.
#[derive(Clone, Debug)]
pub enum Storage {
    /// A PostgreSQL connection pool.
    Postgres(DbPool),
    /// Process-local tables.
    Memory(MemoryDb),
}

impl Storage {
    /// Opens the configured backend, applies migrations and provisions users.
    #[instrument(skip_all, fields(backend = ?config.database.backend))]
    pub async fn connect(config: &Config) -> ApiResult<Self> {
        let storage = match config.database.backend {
            Backend::Postgres => {
                let db = init_db(&config.database);
                tracing::info!("Applying migrations");
                MIGRATOR.run(&db).await?;
                Storage::Postgres(db)
            }
            Backend::Memory => Storage::Memory(MemoryDb::default()),
        };
        storage
            .provision_users(&config.users, config.security.bcrypt_cost)
            .await?;
        Ok(storage)
    }

    /// Starts a new unit of work.
    pub async fn begin(&self) -> ApiResult<UnitOfWork> {
        Ok(match self {
            Storage::Postgres(db) => UnitOfWork::Postgres(db.begin().await?),
            Storage::Memory(db) => UnitOfWork::Memory(db.begin().await),
        })
    }

    /// Hashes and stores the given users, replacing existing ones with the same name.
    #[instrument(skip_all, fields(users = users.len()))]
    pub async fn provision_users(&self, users: &[UserConfig], cost: u32) -> ApiResult<()> {
        let mut uow = self.begin().await?;
        for user in users {
            let credentials = user_repository::hash_credentials(user, cost).await?;
            uow.save_credentials(&credentials).await?;
        }
        uow.commit().await?;
        tracing::info!("Provisioned {} users", users.len());
        Ok(())
    }
}

/// A single atomic unit of work against [`Storage`].
pub enum UnitOfWork {
    /// An open PostgreSQL transaction.
    Postgres(Tx),
    /// An exclusive, staged view of the memory tables.
    Memory(MemoryTx),
}

impl UnitOfWork {
    /// Makes every change done in this unit of work visible.
    pub async fn commit(self) -> ApiResult<()> {
        match self {
            UnitOfWork::Postgres(tx) => tx.commit().await?,
            UnitOfWork::Memory(tx) => tx.commit(),
        }
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOfWork::Postgres(_) => f.write_str("UnitOfWork::Postgres"),
            UnitOfWork::Memory(_) => f.write_str("UnitOfWork::Memory"),
        }
    }
}
