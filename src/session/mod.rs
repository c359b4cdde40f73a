//! Cookie-backed sessions and the identity attached to them.
//!
//! `resolve_session` wraps the handler: it resolves the `Session` from the
//! signed cookie and commits it afterwards. `attach_user` runs inside it and
//! resolves the `CurrentUser`.

pub mod cookie;
pub mod identity;
pub mod manager;
pub mod session;

pub use cookie::CookieSigner;
pub use identity::{attach_user, CurrentUser};
pub use manager::{resolve_session, SessionManager};
pub use session::{CommitPlan, Session, SessionAction};
