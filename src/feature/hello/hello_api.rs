//! An unprotected greeting, handy for checking that the service is up.

use crate::infra::state::AppState;
use axum::{routing::get, Router};
use tracing::instrument;

/// The greeting returned by the hello endpoint.
pub const GREETING: &str = "Hello from axum REST";

/// The hello API endpoints.
pub fn routes() -> Router<AppState> {
    Router::new().route("/hello", get(hello))
}

/// Greets anybody friendly.
#[utoipa::path(
    get,
    path = "/hello",
    responses(
        (status = 200, description = "Success", body = String, content_type = "text/plain"),
    )
)]
#[instrument]
pub async fn hello() -> &'static str {
    GREETING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hello_greets() {
        assert_eq!(GREETING, hello().await);
    }
}
