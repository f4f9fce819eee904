pub mod repository;
pub mod types;

pub use repository::ShiftRepository;
pub use types::{ClockEvent, WorkShift};
