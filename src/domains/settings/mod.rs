pub mod repository;
pub mod types;

pub use repository::SettingsRepository;
pub use types::{AppSettings, AppTheme, FontSize, SectorContact};
