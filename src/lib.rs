use std::sync::Arc;

// Public modules
pub mod auth;
pub mod config;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;
pub mod store;
pub mod utils;
pub mod validation;

// Private modules
mod db_migration;

pub use config::CoreConfig;
pub use store::RecordStore;

/// Initialize the library from `config`.
/// This function must be called before any other function in the library.
pub async fn initialize(config: CoreConfig) -> ffi::FFIResult<()> {
    globals::initialize(config).await
}

/// Report whether the device can reach the network.
pub fn set_online(online: bool) -> ffi::FFIResult<()> {
    globals::set_online(online)
}

/// The record store built by [`initialize`].
pub fn record_store() -> ffi::FFIResult<Arc<RecordStore>> {
    globals::get_record_store()
}

/// Get a reference to the SQLite connection pool
/// This is primarily for internal use
pub fn get_db_pool() -> ffi::FFIResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
