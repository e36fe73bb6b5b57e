//! Types and functions for storing and loading user credentials.

use crate::infra::{
    config::UserConfig,
    database::{Tx, UnitOfWork},
    error::ApiResult,
    memory::MemoryTx,
};
use tracing::instrument;

/// A user's stored credentials and role claims.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Credentials {
    /// The principal name.
    pub username: String,
    /// A bcrypt hash of the user's password.
    #[sqlx(rename = "password")]
    pub password_hash: String,
    /// Role claims.
    pub roles: Vec<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Hashes a configured user's password.
#[instrument(skip_all, fields(username = %user.username))]
pub async fn hash_credentials(user: &UserConfig, cost: u32) -> ApiResult<Credentials> {
    let password = user.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(Credentials {
        username: user.username.clone(),
        password_hash,
        roles: user.roles.clone(),
    })
}

/// Anything that can store and look up credentials.
#[async_trait::async_trait]
pub trait UserStore: Send {
    /// Finds a user's credentials by username.
    async fn fetch_credentials(&mut self, username: &str) -> ApiResult<Option<Credentials>>;
    /// Inserts or replaces a user's credentials.
    async fn save_credentials(&mut self, credentials: &Credentials) -> ApiResult<()>;
}

#[async_trait::async_trait]
impl UserStore for Tx {
    #[instrument(skip(self))]
    async fn fetch_credentials(&mut self, username: &str) -> ApiResult<Option<Credentials>> {
        tracing::debug!("Fetching {}'s credentials", username);
        let credentials = sqlx::query_as::<_, Credentials>(
            r#"
            SELECT username, password, roles FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut **self)
        .await?;
        Ok(credentials)
    }

    #[instrument(skip_all, fields(username = %credentials.username))]
    async fn save_credentials(&mut self, credentials: &Credentials) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password, roles)
            VALUES ($1, $2, $3)
            ON CONFLICT (username)
            DO UPDATE SET password = EXCLUDED.password, roles = EXCLUDED.roles
            "#,
        )
        .bind(&credentials.username)
        .bind(&credentials.password_hash)
        .bind(&credentials.roles)
        .execute(&mut **self)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryTx {
    async fn fetch_credentials(&mut self, username: &str) -> ApiResult<Option<Credentials>> {
        Ok(self.tables().users.get(username).cloned())
    }

    async fn save_credentials(&mut self, credentials: &Credentials) -> ApiResult<()> {
        self.tables_mut()
            .users
            .insert(credentials.username.clone(), credentials.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for UnitOfWork {
    async fn fetch_credentials(&mut self, username: &str) -> ApiResult<Option<Credentials>> {
        match self {
            UnitOfWork::Postgres(tx) => tx.fetch_credentials(username).await,
            UnitOfWork::Memory(tx) => tx.fetch_credentials(username).await,
        }
    }

    async fn save_credentials(&mut self, credentials: &Credentials) -> ApiResult<()> {
        match self {
            UnitOfWork::Postgres(tx) => tx.save_credentials(credentials).await,
            UnitOfWork::Memory(tx) => tx.save_credentials(credentials).await,
        }
    }
}
