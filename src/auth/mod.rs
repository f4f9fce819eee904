pub mod identity;

pub use identity::{acquire_identity_with_timeout, RemoteIdentity, DEFAULT_IDENTITY_TIMEOUT};
