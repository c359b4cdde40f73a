pub mod base;
pub mod google_provider;

// Re-export so we can do "use crate::providers::*;"
pub use base::{Credential, ProviderProfile, Strategy};
pub use google_provider::{GoogleProviderConfig, GoogleStrategy};
