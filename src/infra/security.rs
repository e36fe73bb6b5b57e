//! Authentication and role gates.
//!
//! Handlers ask for a [`Caller<R>`], where `R` is the [`Role`] the endpoint
//! requires. Extraction fails with `401` when no valid credentials are
//! presented and with `403` when the caller lacks the role, so a handler is
//! never invoked for a caller that is not allowed to run it.

use super::{
    database::Storage,
    error::{ApiResult, ClientError},
    state::AppState,
};
use crate::feature::user::user_repository::UserStore;
use axum::{async_trait, extract::FromRequestParts};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use http::request::Parts;
use std::{collections::BTreeSet, marker::PhantomData};
use tracing::instrument;

/// A requirement on the caller's role claims.
pub trait Role {
    /// Whether a caller with these roles fulfills the requirement.
    fn is_satisfied(roles: &BTreeSet<String>) -> bool;
}

/// Any authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authenticated;

impl Role for Authenticated {
    fn is_satisfied(_: &BTreeSet<String>) -> bool {
        true
    }
}

/// A caller allowed to read items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reader;

impl Role for Reader {
    fn is_satisfied(roles: &BTreeSet<String>) -> bool {
        roles.contains("reader")
    }
}

/// A caller allowed to create and delete items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Writer;

impl Role for Writer {
    fn is_satisfied(roles: &BTreeSet<String>) -> bool {
        roles.contains("writer")
    }
}

/// An authenticated caller known to satisfy role `R`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller<R = Authenticated> {
    username: String,
    roles: BTreeSet<String>,
    role: PhantomData<R>,
}

impl Caller {
    /// Constructs an authenticated caller.
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        Caller {
            username: username.into(),
            roles: roles.into_iter().collect(),
            role: PhantomData,
        }
    }
}

impl<R> Caller<R> {
    /// The caller's principal name.
    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    /// The caller's role claims.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Checks that the caller satisfies role `T`.
    pub fn require<T: Role>(self) -> Result<Caller<T>, ClientError> {
        if T::is_satisfied(&self.roles) {
            Ok(Caller {
                username: self.username,
                roles: self.roles,
                role: PhantomData,
            })
        } else {
            tracing::warn!("{} lacks the required role", self.username);
            Err(ClientError::Forbidden)
        }
    }
}

#[async_trait]
impl<R> FromRequestParts<AppState> for Caller<R>
where
    R: Role + Send + Sync,
{
    type Rejection = super::error::ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(auth) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ClientError::Unauthorized)?;
        let caller = authenticate(state.storage(), auth.username(), auth.password()).await?;
        Ok(caller.require::<R>()?)
    }
}

/// Validate a user's password.
#[instrument(skip(storage, password))]
pub async fn authenticate(storage: &Storage, username: &str, password: &str) -> ApiResult<Caller> {
    let mut uow = storage.begin().await?;
    let credentials = uow.fetch_credentials(username).await?;
    drop(uow);

    let Some(credentials) = credentials else {
        tracing::info!("Unknown user");
        return Err(ClientError::Unauthorized.into());
    };

    tracing::debug!("Verifying password");
    let password = password.to_string();
    let hash = credentials.password_hash;
    let password_is_ok =
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    if password_is_ok {
        Ok(Caller::new(credentials.username, credentials.roles))
    } else {
        tracing::info!("Wrong password");
        Err(ClientError::Unauthorized.into())
    }
}
