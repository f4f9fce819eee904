pub mod clock;
pub mod id;

pub use clock::{Clock, SystemClock};
pub use id::new_record_id;
