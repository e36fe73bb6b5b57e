//! OpenAPI configuration.

use crate::feature::{
    hello::hello_api,
    info::info_api,
    item::{item_api, item_repository},
    me::me_api,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

/// OpenApi configuration.
#[derive(OpenApi)]
#[openapi(
    paths(
        info_api::info,
        hello_api::hello,
        me_api::me,
        item_api::list_items,
        item_api::get_item,
        item_api::create_item,
        item_api::delete_item,
    ),
    components(
        schemas(
            info_api::AppInfo,
            me_api::Identity,
            item_repository::NewItem,
            item_repository::Item,
            crate::infra::error::ErrorBody
        )
    ),
    modifiers(&SecurityAddon)
)]
#[derive(Clone, Copy, Debug)]
pub struct ApiDoc;

/// Security settings
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            )
        }
    }
}
