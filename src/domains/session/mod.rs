pub mod repository;
pub mod types;

pub use repository::SessionRepository;
pub use types::{EntryDraft, UserSession};
