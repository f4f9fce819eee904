use crate::domains::sync::remote::RemoteBackend;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Account authenticated against the remote backend. Every pushed row is owned by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Default bound on identity retrieval during operator login.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Ask the backend for the current identity, giving up after `timeout`.
///
/// Errors and timeouts both yield `None`.
pub async fn acquire_identity_with_timeout(backend: &dyn RemoteBackend, timeout: Duration) -> Option<RemoteIdentity> {
    match tokio::time::timeout(timeout, backend.get_authenticated_identity()).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(e)) => {
            warn!("Identity lookup failed: {}", e);
            None
        }
        Err(_) => {
            debug!("Identity lookup timed out after {:?}", timeout);
            None
        }
    }
}
