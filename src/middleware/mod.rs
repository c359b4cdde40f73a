//! Middleware that runs before routing.

pub mod form;
pub mod method_override;
pub mod security;

pub use method_override::method_override;
pub use security::{with_security_headers, xss_clean};
