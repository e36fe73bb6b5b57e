//! Types and functions for storing and loading items.

use crate::infra::{
    database::{Tx, UnitOfWork},
    error::{ApiError, ApiResult, ClientError},
    memory::MemoryTx,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, Instrument};
use utoipa::ToSchema;

/// An item as submitted by a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct NewItem {
    /// An id the client believes is free. Never used as the stored id.
    pub id: Option<i64>,
    /// The item's title.
    #[schema(example = "Test title")]
    pub title: String,
    /// The item's description.
    #[schema(example = "Test description")]
    pub description: String,
    /// Ignored, the owner is always the caller.
    pub owner_username: Option<String>,
}

/// An item that has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsavedItem {
    /// The item's title.
    pub title: String,
    /// The item's description.
    pub description: String,
    /// The creating caller.
    pub owner_username: String,
}

/// An existing item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// The item's id.
    pub id: i64,
    /// The item's title.
    #[schema(example = "Test title")]
    pub title: String,
    /// The item's description.
    #[schema(example = "Test description")]
    pub description: String,
    /// The user who created the item.
    #[schema(example = "writer")]
    pub owner_username: String,
}

impl Item {
    fn from_unsaved(id: i64, item: &UnsavedItem) -> Self {
        Item {
            id,
            title: item.title.clone(),
            description: item.description.clone(),
            owner_username: item.owner_username.clone(),
        }
    }
}

/// Anything that can store items.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ItemStore: Send {
    /// Stores a new item and returns its assigned id.
    async fn create(&mut self, item: &UnsavedItem) -> ApiResult<i64>;
    /// Fetches an item, if it exists.
    async fn find_by_id(&mut self, id: i64) -> ApiResult<Option<Item>>;
    /// Lists every item in insertion order.
    async fn find_all(&mut self) -> ApiResult<Vec<Item>>;
    /// Removes an item.
    async fn delete(&mut self, item: &Item) -> ApiResult<()>;
}

#[async_trait::async_trait]
impl ItemStore for Tx {
    #[instrument(skip(self))]
    async fn create(&mut self, item: &UnsavedItem) -> ApiResult<i64> {
        tracing::info!("Creating item");
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT nextval(pg_get_serial_sequence('items', 'id'))
            "#,
        )
        .fetch_one(&mut **self)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO items (id, title, description, owner_username)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.owner_username)
        .execute(&mut **self)
        .await
        .map_err(|e| conflict_on_duplicate_id(id, e))?;
        tracing::info!("Created item {}", id);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&mut self, id: i64) -> ApiResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, title, description, owner_username FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **self)
        .instrument(tracing::info_span!("fetch_optional"))
        .await?;
        tracing::info!("Found item: {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn find_all(&mut self) -> ApiResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, title, description, owner_username FROM items
            ORDER BY id
            "#,
        )
        .fetch_all(&mut **self)
        .instrument(tracing::info_span!("fetch_all"))
        .await?;
        tracing::info!("Listed {} items", items.len());
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn delete(&mut self, item: &Item) -> ApiResult<()> {
        sqlx::query(
            r#"
            DELETE FROM items
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .execute(&mut **self)
        .await?;
        tracing::info!("Deleted item {}", item.id);
        Ok(())
    }
}

/// A taken id means the identity sequence fell behind rows inserted with explicit ids.
fn conflict_on_duplicate_id(id: i64, e: sqlx::Error) -> ApiError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            tracing::warn!("Item {} already exists", id);
            ClientError::Conflict(format!("Item with id {id} already exists.")).into()
        }
        e => e.into(),
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryTx {
    async fn create(&mut self, item: &UnsavedItem) -> ApiResult<i64> {
        let tables = self.tables_mut();
        tables.last_item_id += 1;
        let id = tables.last_item_id;
        tables.items.insert(id, Item::from_unsaved(id, item));
        Ok(id)
    }

    async fn find_by_id(&mut self, id: i64) -> ApiResult<Option<Item>> {
        Ok(self.tables().items.get(&id).cloned())
    }

    async fn find_all(&mut self) -> ApiResult<Vec<Item>> {
        Ok(self.tables().items.values().cloned().collect())
    }

    async fn delete(&mut self, item: &Item) -> ApiResult<()> {
        self.tables_mut().items.remove(&item.id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ItemStore for UnitOfWork {
    async fn create(&mut self, item: &UnsavedItem) -> ApiResult<i64> {
        match self {
            UnitOfWork::Postgres(tx) => tx.create(item).await,
            UnitOfWork::Memory(tx) => tx.create(item).await,
        }
    }

    async fn find_by_id(&mut self, id: i64) -> ApiResult<Option<Item>> {
        match self {
            UnitOfWork::Postgres(tx) => tx.find_by_id(id).await,
            UnitOfWork::Memory(tx) => tx.find_by_id(id).await,
        }
    }

    async fn find_all(&mut self) -> ApiResult<Vec<Item>> {
        match self {
            UnitOfWork::Postgres(tx) => tx.find_all().await,
            UnitOfWork::Memory(tx) => tx.find_all().await,
        }
    }

    async fn delete(&mut self, item: &Item) -> ApiResult<()> {
        match self {
            UnitOfWork::Postgres(tx) => tx.delete(item).await,
            UnitOfWork::Memory(tx) => tx.delete(item).await,
        }
    }
}
