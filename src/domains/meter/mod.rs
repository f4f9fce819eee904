pub mod repository;
pub mod types;

pub use repository::MeterRepository;
pub use types::{Meter, MeterReading, MeterType, MeterUnit};
