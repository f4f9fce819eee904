pub mod service;
pub mod types;

pub use service::{master_data_json, parse_import_file, ImportService};
pub use types::MasterDataDocument;
