//! A service for interacting with items.
//!
//! Callers are passed in explicitly and typed by the role they were checked
//! against, so these functions can only be reached by a caller that is
//! allowed to run them.

use super::item_repository::{Item, ItemStore, NewItem, UnsavedItem};
use crate::infra::{
    error::{ApiResult, ClientError},
    security::{Caller, Reader, Writer},
};
use tracing::instrument;

/// Lists all items.
#[instrument(skip(store))]
pub async fn list_items<S: ItemStore>(
    store: &mut S,
    _caller: &Caller<Reader>,
) -> ApiResult<Vec<Item>> {
    store.find_all().await
}

/// Reads an item.
#[instrument(skip(store))]
pub async fn get_item<S: ItemStore>(
    store: &mut S,
    _caller: &Caller<Reader>,
    id: i64,
) -> ApiResult<Item> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id).into())
}

/// Creates a new item owned by the caller.
///
/// Fails with a conflict when the client supplied the id of an existing item.
/// The stored id is always assigned by the store.
#[instrument(skip(store))]
pub async fn create_item<S: ItemStore>(
    store: &mut S,
    caller: &Caller<Writer>,
    new_item: NewItem,
) -> ApiResult<Item> {
    if let Some(id) = new_item.id {
        if store.find_by_id(id).await?.is_some() {
            tracing::warn!("Item {} already exists", id);
            return Err(ClientError::Conflict(format!("Item with id {id} already exists.")).into());
        }
    }

    let unsaved = UnsavedItem {
        title: new_item.title,
        description: new_item.description,
        owner_username: caller.username().to_string(),
    };
    let id = store.create(&unsaved).await?;
    Ok(Item {
        id,
        title: unsaved.title,
        description: unsaved.description,
        owner_username: unsaved.owner_username,
    })
}

/// Deletes an item.
#[instrument(skip(store))]
pub async fn delete_item<S: ItemStore>(
    store: &mut S,
    _caller: &Caller<Writer>,
    id: i64,
) -> ApiResult<()> {
    let item = store.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
    store.delete(&item).await
}

fn not_found(id: i64) -> ClientError {
    tracing::warn!("Item {} not found", id);
    ClientError::NotFound(format!("Item with id {id} not found."))
}
