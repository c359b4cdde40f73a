//! Server-side rendering: the per-request view context, the tera templates
//! and their helpers.

pub mod context;
pub mod helpers;
pub mod templates;

pub use context::{inject_view_context, render_error_pages, ViewContext};
pub use templates::Templates;
