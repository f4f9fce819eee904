use crate::domains::entry::VehicleEntry;
use serde::{Deserialize, Serialize};

pub const MASTER_DATA_VERSION: &str = "1.0";
pub const MASTER_DATA_TYPE: &str = "MASTER_DATA";

/// Visitor base shared between devices as a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterDataDocument {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entries: Vec<VehicleEntry>,
}

impl MasterDataDocument {
    pub fn new(entries: Vec<VehicleEntry>) -> Self {
        Self {
            version: MASTER_DATA_VERSION.to_string(),
            kind: MASTER_DATA_TYPE.to_string(),
            entries,
        }
    }
}
