use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::session::Session;
use crate::auth::Auth;
use crate::models::{User, USER_ID_KEY};
use crate::utils::http_helpers::HTTPError;

/// The user the request's session is logged in as, resolved once per request.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Middleware: turns the session's `user_id` into a `CurrentUser`.
///
/// Must run inside `resolve_session`. A `user_id` that no longer resolves is
/// dropped from the session and the request continues anonymously.
pub async fn attach_user(
    State(auth): State<Arc<Auth>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return HTTPError::internal("session layer is not installed").into_response();
    };

    let user = match session.user_id() {
        None => None,
        Some(user_id) => match auth.deserialize_user(&user_id).await {
            Ok(Some(user)) => {
                debug!(user_id = user.id.as_str(), "attached user to request");
                Some(user)
            }
            Ok(None) => {
                warn!(
                    event_name = "session.user.stale",
                    event_domain = "session",
                    user_id = user_id.as_str(),
                    "session refers to a user that no longer exists"
                );
                session.remove(USER_ID_KEY);
                None
            }
            Err(e) => return HTTPError::from(e).into_response(),
        },
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HTTPError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| HTTPError::internal("identity layer is not installed"))
    }
}

