//! The item API implementation.

use crate::{
    feature::item::{
        item_repository::{Item, NewItem},
        item_service,
    },
    infra::{
        database::Storage,
        error::{ApiResult, ClientError},
        extract::Json,
        security::{Caller, Reader, Writer},
        state::AppState,
    },
};
use axum::{extract::State, Router};
use axum_extra::routing::{RouterExt, TypedPath};
use http::{header::LOCATION, StatusCode};
use serde::Deserialize;
use tracing::instrument;

/// The item API endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .typed_get(list_items)
        .typed_post(create_item)
        .typed_get(get_item)
        .typed_delete(delete_item)
}

/// The item collection.
#[derive(Clone, Copy, Debug, Deserialize, TypedPath)]
#[typed_path("/items", rejection(ClientError))]
pub struct Items;

/// A single item.
#[derive(Clone, Copy, Debug, Deserialize, TypedPath)]
#[typed_path("/items/:id", rejection(ClientError))]
pub struct ItemsId(pub i64);

/// Lists all items.
#[utoipa::path(
    get,
    path = "/items",
    responses(
        (status = 200, description = "Found items", body = [Item]),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip_all, fields(caller = %caller.username()))]
pub async fn list_items(
    Items: Items,
    caller: Caller<Reader>,
    State(storage): State<Storage>,
) -> ApiResult<Json<Vec<Item>>> {
    let mut uow = storage.begin().await?;
    let items = item_service::list_items(&mut uow, &caller).await?;
    Ok(Json(items))
}

/// Gets an item by id.
#[utoipa::path(
    get,
    path = "/items/{id}",
    params(("id" = i64, Path, description = "The item's id")),
    responses(
        (status = 200, description = "Found item", body = Item),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip_all, fields(caller = %caller.username()))]
pub async fn get_item(
    path: Result<ItemsId, ClientError>,
    caller: Caller<Reader>,
    State(storage): State<Storage>,
) -> ApiResult<Json<Item>> {
    let ItemsId(id) = path?;
    let mut uow = storage.begin().await?;
    let item = item_service::get_item(&mut uow, &caller, id).await?;
    Ok(Json(item))
}

/// Creates an item owned by the caller.
#[utoipa::path(
    post,
    path = "/items",
    request_body = NewItem,
    responses(
        (status = 201, description = "Created item, located by the Location header", body = Item),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 409, description = "Item with id already exists", body = ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip_all, fields(caller = %caller.username()))]
pub async fn create_item(
    Items: Items,
    caller: Caller<Writer>,
    State(storage): State<Storage>,
    Json(new_item): Json<NewItem>,
) -> ApiResult<(StatusCode, [(http::HeaderName, String); 1], Json<Item>)> {
    let mut uow = storage.begin().await?;
    let item = item_service::create_item(&mut uow, &caller, new_item).await?;
    uow.commit().await?;
    let location = ItemsId(item.id).to_string();
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(item)))
}

/// Deletes an item.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    params(("id" = i64, Path, description = "The item's id")),
    responses(
        (status = 202, description = "Deleted item"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip_all, fields(caller = %caller.username()))]
pub async fn delete_item(
    path: Result<ItemsId, ClientError>,
    caller: Caller<Writer>,
    State(storage): State<Storage>,
) -> ApiResult<StatusCode> {
    let ItemsId(id) = path?;
    let mut uow = storage.begin().await?;
    item_service::delete_item(&mut uow, &caller, id).await?;
    uow.commit().await?;
    Ok(StatusCode::ACCEPTED)
}
