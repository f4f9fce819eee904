pub mod mapping;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod types;

pub use remote::{ApiRemoteBackend, RemoteBackend};
pub use scheduler::{AutoSyncScheduler, ConnectivityMonitor, SchedulerHandle, DEFAULT_SYNC_INTERVAL};
pub use service::{StatusCallback, SyncService, SyncServiceImpl};
pub use types::{SyncOutcome, SyncStats, SyncStatus};
