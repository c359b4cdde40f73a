use axum::response::Html;
use tera::{Context, Tera};
use tracing::error;

use super::context::ViewContext;
use super::helpers;
use crate::utils::http_helpers::HTTPError;

/// Page templates, compiled into the binary.
const TEMPLATES: &[(&str, &str)] = &[
    ("layouts/main.html", include_str!("../../views/layouts/main.html")),
    ("layouts/login.html", include_str!("../../views/layouts/login.html")),
    ("partials/header.html", include_str!("../../views/partials/header.html")),
    ("partials/add_btn.html", include_str!("../../views/partials/add_btn.html")),
    ("login.html", include_str!("../../views/login.html")),
    ("dashboard.html", include_str!("../../views/dashboard.html")),
    ("stories/index.html", include_str!("../../views/stories/index.html")),
    ("stories/add.html", include_str!("../../views/stories/add.html")),
    ("stories/edit.html", include_str!("../../views/stories/edit.html")),
    ("stories/show.html", include_str!("../../views/stories/show.html")),
    ("error/404.html", include_str!("../../views/error/404.html")),
    ("error/500.html", include_str!("../../views/error/500.html")),
];

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        helpers::register(&mut tera);
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Templates { tera })
    }

    /// Renders `name` with `context`, plus the request's `user` (an object or null).
    pub fn render(
        &self,
        name: &str,
        view: &ViewContext,
        mut context: Context,
    ) -> Result<Html<String>, HTTPError> {
        context.insert("user", &view.user());
        self.tera.render(name, &context).map(Html).map_err(|e| {
            error!(
                event_name = "view.render.failed",
                event_domain = "view",
                template = name,
                "failed to render template: {:?}",
                e
            );
            HTTPError::internal("Failed to render page")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, Story, StoryInput, StoryStatus, User};

    fn user(id: &str) -> User {
        User::from_new(
            id.to_string(),
            NewUser {
                google_id: format!("g-{}", id),
                display_name: "Ada Lovelace".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                image: None,
            },
        )
    }

    fn story(owner: &str) -> Story {
        Story::from_input(
            "s1".to_string(),
            owner.to_string(),
            StoryInput {
                title: "A Title".to_string(),
                body: "Once upon a time".to_string(),
                status: StoryStatus::Private,
            },
        )
    }

    #[test]
    fn test_all_templates_compile() {
        Templates::new().unwrap();
    }

    #[test]
    fn test_login_page_without_user() {
        let templates = Templates::new().unwrap();
        let Html(page) = templates
            .render("login.html", &ViewContext::default(), Context::new())
            .unwrap();
        assert!(page.contains("/auth/google"));
    }

    #[test]
    fn test_edit_form_preselects_status() {
        let templates = Templates::new().unwrap();
        let mut context = Context::new();
        context.insert("story", &story("u1"));
        context.insert("statuses", &["public", "private", "draft"]);
        let Html(page) = templates
            .render("stories/edit.html", &ViewContext::new(Some(user("u1"))), context)
            .unwrap();
        assert!(page.contains(r#"<option value="private" selected="selected">Private</option>"#));
        assert!(page.contains(r#"name="_method" value="PUT""#));
    }

    #[test]
    fn test_edit_icon_only_shown_to_owner() {
        let templates = Templates::new().unwrap();
        let mut context = Context::new();
        context.insert("stories", &vec![story("u1")]);

        let Html(owner) = templates
            .render("stories/index.html", &ViewContext::new(Some(user("u1"))), context.clone())
            .unwrap();
        let Html(other) = templates
            .render("stories/index.html", &ViewContext::new(Some(user("u2"))), context)
            .unwrap();

        assert!(owner.contains("/stories/edit/s1"));
        assert!(!other.contains("/stories/edit/s1"));
    }

    #[test]
    fn test_dashboard_delete_forms_per_story() {
        let templates = Templates::new().unwrap();
        let mut second = story("u1");
        second.id = "s2".to_string();
        let mut context = Context::new();
        context.insert("stories", &vec![story("u1"), second]);

        let Html(page) = templates
            .render("dashboard.html", &ViewContext::new(Some(user("u1"))), context)
            .unwrap();

        assert_eq!(page.matches(r#"name="_method" value="DELETE""#).count(), 2);
        assert!(page.contains(r#"<form action="/stories/s1" method="POST">"#));
        assert!(page.contains(r#"<form action="/stories/s2" method="POST">"#));
        assert!(!page.contains("delete-form"));
    }

    #[test]
    fn test_unknown_template_is_500() {
        let templates = Templates::new().unwrap();
        let err = templates
            .render("nope.html", &ViewContext::default(), Context::new())
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
