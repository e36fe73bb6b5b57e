//! Introspection of the authenticated caller.

use crate::infra::{
    error::ApiResult,
    extract::Json,
    security::Caller,
    state::AppState,
};
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;
use utoipa::ToSchema;

/// The identity API endpoints.
pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// Who the caller is authenticated as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// The caller's principal name.
    #[schema(example = "reader")]
    pub user_name: String,
    /// The caller's roles.
    #[schema(value_type = Vec<String>, example = json!(["reader"]))]
    pub roles: BTreeSet<String>,
}

/// Returns the caller's identity.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The authenticated caller", body = Identity),
        (status = 401, description = "Unauthorized", body = ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip_all, fields(caller = %caller.username()))]
pub async fn me(caller: Caller) -> ApiResult<Json<Identity>> {
    tracing::info!("Roles: {:?}", caller.roles());
    Ok(Json(Identity {
        user_name: caller.username().to_string(),
        roles: caller.roles().clone(),
    }))
}
