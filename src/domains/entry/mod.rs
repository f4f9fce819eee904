pub mod repository;
pub mod types;

pub use repository::EntryRepository;
pub use types::{
    AccessType, DestinationSector, EntryStatus, ImportOrigin, OperationType, ProfilePatch, VehicleEntry,
    VisitorProfile,
};
