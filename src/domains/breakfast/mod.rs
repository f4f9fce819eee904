pub mod repository;
pub mod types;

pub use repository::BreakfastRepository;
pub use types::{BreakfastOrigin, BreakfastRecord, BreakfastStatus, BreakfastType};
