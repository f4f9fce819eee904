use crate::errors::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status reported to the caller's callback during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

/// Counts produced by one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Remote ids deleted, per table.
    pub deleted: BTreeMap<String, usize>,
    /// Tables whose deletion batch failed and stays queued.
    pub failed_deletions: BTreeMap<String, String>,
    /// Records pushed, per collection.
    pub pushed: BTreeMap<String, usize>,
    pub settings_pushed: bool,
    /// Dirty records left unsynced because they cannot be decoded, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unreadable: BTreeMap<String, usize>,
}

impl SyncStats {
    pub fn total_pushed(&self) -> usize {
        self.pushed.values().sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    pub fn total_unreadable(&self) -> usize {
        self.unreadable.values().sum()
    }
}

/// Structured result of a pass. Sync never throws to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub stats: SyncStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
}

impl SyncOutcome {
    pub fn completed(stats: SyncStats) -> Self {
        let mut message = format!(
            "Sync complete: {} records sent, {} remote deletions",
            stats.total_pushed(),
            stats.total_deleted()
        );
        if stats.total_unreadable() > 0 {
            message.push_str(&format!(", {} unreadable records left unsynced", stats.total_unreadable()));
        }
        Self {
            success: true,
            message,
            stats,
            error: None,
        }
    }

    pub fn failed(error: SyncError, stats: SyncStats) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            stats,
            error: Some(error),
        }
    }

    /// True when the pass did not run because it could not, rather than because the remote refused.
    pub fn is_soft_failure(&self) -> bool {
        self.error.as_ref().map_or(false, SyncError::is_soft)
    }
}
