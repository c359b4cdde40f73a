//! Extractors that gate pages on the login state.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use crate::models::User;
use crate::session::CurrentUser;
use crate::utils::http_helpers::redirect;

/// A logged-in user. Anonymous requests are sent to the login page.
pub struct AuthUser(pub User);

/// An anonymous visitor. Logged-in users are sent to their dashboard.
pub struct Guest;

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        user.map(AuthUser).ok_or_else(|| redirect("/"))
    }
}

impl<S> FromRequestParts<S> for Guest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(_) => Err(redirect("/dashboard")),
            None => Ok(Guest),
        }
    }
}
