//! Library exports for storybooks, shared between the binary and tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
pub mod view;
