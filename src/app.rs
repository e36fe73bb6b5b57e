//! The HTTP application.
//!
//! # Examples
//!
//! Hello API.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # let url = axum_items::app::spawn_app().await;
//! let response = reqwest::get(format!("{}/hello", url)).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!("Hello from axum REST", response.text().await.unwrap());
//! # });
//! ```
//!
//! Create an item.
//!
//! ```rust
//! # use axum_items::feature::item::item_repository::{Item, NewItem};
//! # tokio_test::block_on(async {
//! # let url = axum_items::app::spawn_app().await;
//! let client = reqwest::Client::new();
//! let new_item = NewItem { title: "Foo".to_string(), ..Default::default() };
//! let response = client
//!     .post(format!("{}/items", url))
//!     .basic_auth("writer", Some("writer"))
//!     .json(&new_item)
//!     .send()
//!     .await
//!     .unwrap();
//! assert_eq!(201, response.status());
//! let item = response.json::<Item>().await.unwrap();
//! assert_eq!("writer", item.owner_username);
//! # });
//! ```

use crate::feature::{hello::hello_api, info::info_api, item::item_api, me::me_api};
use crate::infra::error::{InternalError, PanicHandler};
use crate::infra::middleware::{log_request_response, MakeRequestIdSpan};
use crate::infra::openapi::ApiDoc;
use crate::infra::{config::Config, database::Storage, state::AppState};
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use http::{header::AUTHORIZATION, StatusCode};
use std::iter;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

/// Constructs the full axum application.
pub fn app(state: AppState) -> Router {
    let server = &state.config().server;

    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e| async move {
            InternalError::Other(format!("Tower middleware failed: {e}")).into_response()
        }))
        .concurrency_limit(server.concurrency_limit);
    let timeout = server.request_timeout;

    Router::new()
        .route("/", get(|| async { Redirect::temporary("/swagger-ui") }))
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
        .merge(Redoc::with_url("/redoc", ApiDoc::openapi()))
        .merge(RapiDoc::new("/openapi.json").path("/rapidoc"))
        .merge(api(state))
        // Layers
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(axum::middleware::from_fn(log_request_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(iter::once(
            AUTHORIZATION,
        )))
        .layer(tower_middleware)
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// The REST endpoints.
fn api(state: AppState) -> Router {
    Router::new()
        .merge(info_api::routes())
        .merge(hello_api::routes())
        .merge(me_api::routes())
        .merge(item_api::routes())
        .with_state(state)
}

/// Starts the axum server.
pub async fn run_app(
    listener: TcpListener,
    storage: Storage,
    config: Config,
) -> std::io::Result<()> {
    let state = AppState::new(storage, config);
    let app = app(state).into_make_service();

    tracing::info!("Starting axum on {}", listener.local_addr()?);
    let exit_result = axum::serve(listener, app)
        .with_graceful_shutdown(crate::infra::shutdown::shutdown_signal())
        .await;

    match &exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    exit_result
}

/// Spawn a server on a random port, configured from the default configuration file.
///
/// # Panics
///
/// If the configuration is invalid or the store cannot be opened.
pub async fn spawn_app() -> String {
    let config = crate::infra::config::load_config().unwrap();
    let storage = Storage::connect(&config).await.unwrap();
    spawn_app_with_storage(storage, config).await
}

/// Spawn a server on a random port with a custom store.
///
/// # Panics
///
/// If no local port can be bound.
pub async fn spawn_app_with_storage(storage: Storage, config: Config) -> String {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(run_app(listener, storage, config));
    format!("http://{address}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::{
            item::item_repository::Item,
            me::me_api::Identity,
        },
        infra::{
            config::{
                Backend, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig, UserConfig,
            },
            error::ErrorBody,
            memory::MemoryDb,
        },
    };
    use axum::body::Body;
    use base64::Engine;
    use http::{header::LOCATION, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use std::time::Duration;
    use tower::ServiceExt;

    fn user(username: &str, roles: &[&str]) -> UserConfig {
        UserConfig {
            username: username.to_string(),
            password: username.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                http_address: "127.0.0.1".to_string(),
                http_port: 0,
                request_timeout: Duration::from_secs(10),
                concurrency_limit: 100,
            },
            database: DatabaseConfig {
                backend: Backend::Memory,
                username: "postgres".to_string(),
                password: "password".to_string(),
                port: 5432,
                database_name: "items".to_string(),
                host: "localhost".to_string(),
                max_connections: 1,
            },
            security: SecurityConfig { bcrypt_cost: 4 },
            logging: LoggingConfig {
                filter: "info".to_string(),
                directory: None,
                otlp_endpoint: None,
            },
            users: vec![
                user("reader", &["reader"]),
                user("writer", &["reader", "writer"]),
                user("scribe", &["writer"]),
                user("nobody", &[]),
            ],
        }
    }

    async fn test_app() -> Router {
        let config = test_config();
        let storage = Storage::Memory(MemoryDb::default());
        storage
            .provision_users(&config.users, config.security.bcrypt_cost)
            .await
            .unwrap();
        app(AppState::new(storage, config))
    }

    fn basic(username: &str) -> String {
        let credentials = format!("{username}:{username}");
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn get(uri: &str, username: &str) -> Request<Body> {
        Request::get(uri)
            .header("Authorization", basic(username))
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, username: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("Authorization", basic(username))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete(uri: &str, username: &str) -> Request<Body> {
        Request::delete(uri)
            .header("Authorization", basic(username))
            .body(Body::empty())
            .unwrap()
    }

    async fn json<T: DeserializeOwned>(res: axum::response::Response) -> T {
        let body = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    const TEST_ITEM: &str = r#"{"title": "Test title", "description": "Test description"}"#;

    #[tokio::test]
    async fn create_read_list_and_delete() {
        let app = test_app().await;

        let res = app.clone().oneshot(post("/items", "writer", TEST_ITEM)).await.unwrap();
        assert_eq!(StatusCode::CREATED, res.status());
        let location = res.headers()[LOCATION].to_str().unwrap().to_string();
        let created: Item = json(res).await;
        assert_eq!(format!("/items/{}", created.id), location);
        assert_eq!("Test title", created.title);
        assert_eq!("Test description", created.description);
        assert_eq!("writer", created.owner_username);

        let res = app.clone().oneshot(get(&location, "writer")).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!(created, json::<Item>(res).await);

        let res = app.clone().oneshot(get("/items", "writer")).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!(vec![created.clone()], json::<Vec<Item>>(res).await);

        let res = app.clone().oneshot(delete(&location, "writer")).await.unwrap();
        assert_eq!(StatusCode::ACCEPTED, res.status());
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        let res = app.oneshot(get(&location, "writer")).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }

    #[tokio::test]
    async fn client_supplied_owner_is_ignored() {
        let app = test_app().await;
        let body = r#"{"title": "Foo", "description": "Bar", "ownerUsername": "mallory"}"#;
        let res = app.oneshot(post("/items", "writer", body)).await.unwrap();
        assert_eq!(StatusCode::CREATED, res.status());
        let created: Item = json(res).await;
        assert_eq!("writer", created.owner_username);
    }

    #[tokio::test]
    async fn creating_an_existing_id_conflicts() {
        let app = test_app().await;

        let res = app.clone().oneshot(post("/items", "writer", TEST_ITEM)).await.unwrap();
        let first: Item = json(res).await;
        let res = app.clone().oneshot(post("/items", "writer", TEST_ITEM)).await.unwrap();
        let second: Item = json(res).await;

        for id in [first.id, second.id] {
            let body = format!(r#"{{"id": {id}, "title": "Other", "description": "Other"}}"#);
            let res = app.clone().oneshot(post("/items", "writer", &body)).await.unwrap();
            assert_eq!(StatusCode::CONFLICT, res.status());
            let error: ErrorBody = json(res).await;
            assert_eq!(format!("Item with id {id} already exists."), error.message());
        }

        let res = app.oneshot(get("/items", "reader")).await.unwrap();
        assert_eq!(vec![first, second], json::<Vec<Item>>(res).await);
    }

    #[tokio::test]
    async fn creating_with_a_free_id_gets_a_new_id() {
        let app = test_app().await;
        let body = r#"{"id": 999, "title": "Foo", "description": "Bar"}"#;
        let res = app.oneshot(post("/items", "writer", body)).await.unwrap();
        assert_eq!(StatusCode::CREATED, res.status());
        let created: Item = json(res).await;
        assert_ne!(999, created.id);
    }

    #[tokio::test]
    async fn deleting_a_missing_item_is_not_found() {
        let app = test_app().await;
        let res = app.oneshot(delete("/items/1234", "scribe")).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());
        let error: ErrorBody = json(res).await;
        assert_eq!("Item with id 1234 not found.", error.message());
    }

    #[tokio::test]
    async fn reader_can_read_but_not_write() {
        let app = test_app().await;

        let res = app.clone().oneshot(get("/items", "reader")).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());

        let res = app.clone().oneshot(post("/items", "reader", TEST_ITEM)).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());

        let res = app.clone().oneshot(delete("/items/1", "reader")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());

        let res = app.oneshot(get("/items", "reader")).await.unwrap();
        assert!(json::<Vec<Item>>(res).await.is_empty());
    }

    #[tokio::test]
    async fn writer_without_reader_role_cannot_read() {
        let app = test_app().await;
        let res = app.clone().oneshot(get("/items", "scribe")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());
        let res = app.oneshot(get("/items/1", "scribe")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());
    }

    #[tokio::test]
    async fn forbidden_takes_precedence_over_not_found() {
        let app = test_app().await;
        let res = app.oneshot(delete("/items/1234", "reader")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());
    }

    #[tokio::test]
    async fn unauthenticated_callers_are_rejected() {
        let app = test_app().await;
        let requests = [
            Request::get("/items").body(Body::empty()).unwrap(),
            Request::get("/items/1").body(Body::empty()).unwrap(),
            Request::post("/items")
                .header("Content-Type", "application/json")
                .body(Body::from(TEST_ITEM))
                .unwrap(),
            Request::delete("/items/1").body(Body::empty()).unwrap(),
            Request::get("/me").body(Body::empty()).unwrap(),
        ];
        for req in requests {
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        }
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = test_app().await;
        let req = Request::get("/me")
            .header(
                "Authorization",
                format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode("writer:notwriter")
                ),
            )
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        let error: ErrorBody = json(res).await;
        assert_eq!("unauthorized", error.message());
    }

    #[tokio::test]
    async fn me_returns_the_caller() {
        let app = test_app().await;
        let res = app.clone().oneshot(get("/me", "reader")).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let identity: Identity = json(res).await;
        assert_eq!("reader", identity.user_name);
        assert!(identity.roles.contains("reader"));

        let res = app.oneshot(get("/me", "nobody")).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let identity: Identity = json(res).await;
        assert!(identity.roles.is_empty());
    }

    #[tokio::test]
    async fn non_numeric_id_is_a_bad_request() {
        let app = test_app().await;
        let res = app.oneshot(get("/items/abc", "reader")).await.unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, res.status());
    }

    #[tokio::test]
    async fn caller_is_checked_before_the_id_is_parsed() {
        let app = test_app().await;
        let req = Request::get("/items/abc").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(StatusCode::UNAUTHORIZED, res.status());

        let req = Request::delete("/items/abc").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(StatusCode::UNAUTHORIZED, res.status());

        let res = app.clone().oneshot(delete("/items/abc", "reader")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());

        let res = app.oneshot(get("/items/abc", "scribe")).await.unwrap();
        assert_eq!(StatusCode::FORBIDDEN, res.status());
    }

    #[tokio::test]
    async fn hello_needs_no_credentials() {
        let app = test_app().await;
        let req = Request::get("/hello").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&b"Hello from axum REST"[..], &body[..]);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let app = test_app().await;
        let req = Request::get("/info").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn swagger_ui_oneshot() {
        let app = test_app().await;
        let req = Request::get("/swagger-ui/index.html")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
    }

    #[tokio::test]
    async fn openapi_json_oneshot() {
        let app = test_app().await;
        let req = Request::get("/openapi.json").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
    }

    #[tokio::test]
    async fn spawned_server_serves_items() {
        let config = test_config();
        let storage = Storage::connect(&config).await.unwrap();
        let url = spawn_app_with_storage(storage, config).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{url}/items"))
            .basic_auth("writer", Some("writer"))
            .header("Content-Type", "application/json")
            .body(TEST_ITEM)
            .send()
            .await
            .unwrap();
        assert_eq!(201, res.status());
        let created: Item = res.json().await.unwrap();

        let items: Vec<Item> = client
            .get(format!("{url}/items"))
            .basic_auth("reader", Some("reader"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(vec![created], items);
    }
}
