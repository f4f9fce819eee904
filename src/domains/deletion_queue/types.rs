use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending obligation to delete `id` from remote `table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: String,
    pub table: String,
    pub timestamp: DateTime<Utc>,
}
