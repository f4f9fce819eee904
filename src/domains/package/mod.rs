pub mod repository;
pub mod types;

pub use repository::PackageRepository;
pub use types::{PackageRecord, PackageStatus, PickupType};
