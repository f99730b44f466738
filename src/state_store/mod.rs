mod sanitize;
mod saved_session;

pub use sanitize::sanitize_profile_name;
pub use saved_session::{SavedSessionMeta, SessionStateStore};
