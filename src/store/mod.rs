pub mod base;
pub mod memory_store;
pub mod mongodb_store;

// Re-export the primary Store items so code outside can do
// "use crate::store::{SessionStore, create_stores};"
pub use base::{create_stores, SessionStore, Stores, StoryStore, UserStore};
pub use memory_store::MemoryStore;
pub use mongodb_store::MongoDBStore;
