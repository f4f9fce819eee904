pub mod service;
pub mod types;

pub use service::{parse_backup, BackupService};
pub use types::{BackupData, BackupDocument, RestoreSummary, BACKUP_FORMAT_VERSION};
