pub mod session;
pub mod story;
pub mod user;

pub use session::{SessionRecord, USER_ID_KEY};
pub use story::{Story, StoryInput, StoryStatus};
pub use user::{NewUser, User};
