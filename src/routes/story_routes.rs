//! Story pages: browse, show, and the owner-only add/edit/delete forms.

use std::collections::HashMap;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Serialize;
use tera::Context;
use tracing::info;

use super::guards::AuthUser;
use crate::error::StoreError;
use crate::models::{Story, StoryInput, StoryStatus, User};
use crate::state::AppState;
use crate::utils::http_helpers::{redirect, HTTPError};
use crate::view::ViewContext;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stories", get(list_public).post(create))
        .route("/stories/add", get(add_form))
        .route("/stories/{id}", get(show).put(update).delete(remove))
        .route("/stories/edit/{id}", get(edit_form))
        .route("/stories/user/{user_id}", get(list_by_author))
}

/// A story with its author, as shown on the listing pages.
#[derive(Serialize)]
struct StoryCard {
    #[serde(flatten)]
    story: Story,
    author: Option<User>,
}

/// Values echoed back into the add form.
#[derive(Serialize, Default)]
struct FormValues {
    title: String,
    body: String,
    status: &'static str,
}

fn statuses() -> Vec<&'static str> {
    StoryStatus::ALL.iter().map(StoryStatus::as_str).collect()
}

async fn with_authors(state: &AppState, stories: Vec<Story>) -> Result<Vec<StoryCard>, StoreError> {
    let mut authors: HashMap<String, Option<User>> = HashMap::new();
    let mut cards = Vec::with_capacity(stories.len());
    for story in stories {
        if !authors.contains_key(&story.user) {
            let author = state.stores.users.find_by_id(&story.user).await?;
            authors.insert(story.user.clone(), author);
        }
        let author = authors.get(&story.user).cloned().flatten();
        cards.push(StoryCard { story, author });
    }
    Ok(cards)
}

async fn render_listing(
    state: &AppState,
    view: &ViewContext,
    stories: Vec<Story>,
) -> Result<Response, HTTPError> {
    let cards = with_authors(state, stories).await?;
    let mut context = Context::new();
    context.insert("stories", &cards);
    Ok(state
        .templates
        .render("stories/index.html", view, context)?
        .into_response())
}

fn render_add_form(
    state: &AppState,
    view: &ViewContext,
    values: FormValues,
    error: Option<&str>,
) -> Result<Response, HTTPError> {
    let mut context = Context::new();
    context.insert("input", &values);
    context.insert("statuses", &statuses());
    if let Some(error) = error {
        context.insert("error", error);
    }
    let page = state.templates.render("stories/add.html", view, context)?;
    let status = if error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((status, page).into_response())
}

/// Loads a story the user may modify. `Err` carries the response to send instead:
/// 404 for unknown ids, a redirect to `/stories` for someone else's story.
async fn owned_story(state: &AppState, user: &User, id: &str) -> Result<Story, Response> {
    let story = state
        .stores
        .stories
        .find_story(id)
        .await
        .map_err(|e| HTTPError::from(e).into_response())?
        .ok_or_else(|| HTTPError::not_found().into_response())?;
    if !story.is_owned_by(user) {
        return Err(redirect("/stories"));
    }
    Ok(story)
}

async fn list_public(
    _user: AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
) -> Result<Response, HTTPError> {
    let stories = state.stores.stories.list_public(None).await?;
    render_listing(&state, &view, stories).await
}

async fn list_by_author(
    _user: AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
    Path(user_id): Path<String>,
) -> Result<Response, HTTPError> {
    let stories = state.stores.stories.list_public(Some(&user_id)).await?;
    render_listing(&state, &view, stories).await
}

async fn add_form(
    _user: AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
) -> Result<Response, HTTPError> {
    let values = FormValues {
        status: StoryStatus::default().as_str(),
        ..FormValues::default()
    };
    render_add_form(&state, &view, values, None)
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
    form: Result<Form<StoryInput>, FormRejection>,
) -> Result<Response, HTTPError> {
    let Form(input) = form.map_err(|e| HTTPError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    let echo = FormValues {
        title: input.title.clone(),
        body: input.body.clone(),
        status: input.status.as_str(),
    };
    let input = match input.validate() {
        Ok(input) => input,
        Err(message) => return render_add_form(&state, &view, echo, Some(&message)),
    };

    let story = state.stores.stories.create_story(&user.id, input).await?;
    info!(
        event_name = "story.created",
        event_domain = "stories",
        story_id = story.id.as_str(),
        user_id = user.id.as_str(),
        "story created"
    );
    Ok(redirect("/dashboard"))
}

/// Private and draft stories are only visible to their owner; others get a 404.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
    Path(id): Path<String>,
) -> Result<Response, HTTPError> {
    let story = state
        .stores
        .stories
        .find_story(&id)
        .await?
        .filter(|story| story.is_visible_to(Some(&user)))
        .ok_or_else(HTTPError::not_found)?;
    let author = state.stores.users.find_by_id(&story.user).await?;

    let mut context = Context::new();
    context.insert("story", &story);
    context.insert("author", &author);
    Ok(state
        .templates
        .render("stories/show.html", &view, context)?
        .into_response())
}

async fn edit_form(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
    Path(id): Path<String>,
) -> Response {
    let story = match owned_story(&state, &user, &id).await {
        Ok(story) => story,
        Err(response) => return response,
    };
    let mut context = Context::new();
    context.insert("story", &story);
    context.insert("statuses", &statuses());
    state
        .templates
        .render("stories/edit.html", &view, context)
        .into_response()
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
    Path(id): Path<String>,
    form: Result<Form<StoryInput>, FormRejection>,
) -> Response {
    let story = match owned_story(&state, &user, &id).await {
        Ok(story) => story,
        Err(response) => return response,
    };
    let input = match form {
        Ok(Form(input)) => input,
        Err(e) => return HTTPError::new(StatusCode::BAD_REQUEST, e.body_text()).into_response(),
    };
    let input = match input.validate() {
        Ok(input) => input,
        Err(message) => {
            let mut context = Context::new();
            context.insert("story", &story);
            context.insert("statuses", &statuses());
            context.insert("error", &message);
            return match state.templates.render("stories/edit.html", &view, context) {
                Ok(page) => (StatusCode::UNPROCESSABLE_ENTITY, page).into_response(),
                Err(e) => e.into_response(),
            };
        }
    };

    match state.stores.stories.update_story(&story.id, input).await {
        Ok(Some(_)) => redirect("/dashboard"),
        Ok(None) => HTTPError::not_found().into_response(),
        Err(e) => HTTPError::from(e).into_response(),
    }
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let story = match owned_story(&state, &user, &id).await {
        Ok(story) => story,
        Err(response) => return response,
    };
    match state.stores.stories.delete_story(&story.id).await {
        Ok(_) => {
            info!(
                event_name = "story.deleted",
                event_domain = "stories",
                story_id = story.id.as_str(),
                "story deleted"
            );
            redirect("/dashboard")
        }
        Err(e) => HTTPError::from(e).into_response(),
    }
}
