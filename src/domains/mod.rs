pub mod audit;
pub mod backup;
pub mod breakfast;
pub mod core;
pub mod deletion_queue;
pub mod entry;
pub mod import;
pub mod meter;
pub mod package;
pub mod patrol;
pub mod session;
pub mod settings;
pub mod shift;
pub mod sync;
