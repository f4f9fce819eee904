use crate::auth::RemoteIdentity;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;

/// Operations the synchronizer needs from the remote datastore.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// The authenticated account, or `None` when there is no valid session.
    async fn get_authenticated_identity(&self) -> ServiceResult<Option<RemoteIdentity>>;

    /// Insert-or-replace `rows` in `table`, keyed by `id` unless `on_conflict` names another column.
    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: Option<&str>) -> ServiceResult<()>;

    /// Delete every row of `table` whose id is listed. Missing ids are not an error.
    async fn delete_where_id_in(&self, table: &str, ids: &[String]) -> ServiceResult<()>;

    /// Lightweight reachability check. Non-2xx replies count as unreachable.
    async fn check_connection(&self) -> ServiceResult<bool>;
}

/// REST backend speaking the PostgREST dialect.
pub struct ApiRemoteBackend {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl ApiRemoteBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    /// Session token of the signed-in company account. `None` signs out.
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token;
        }
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|guard| guard.clone())
    }

    /// Get the authorization header
    fn auth_header(&self) -> String {
        let token = self.access_token().unwrap_or_else(|| self.api_key.clone());
        format!("Bearer {}", token)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn ensure_success(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to get error details".to_string());
        Err(ServiceError::ExternalService(format!(
            "Server returned error {}: {}",
            status, error_text
        )))
    }
}

#[async_trait]
impl RemoteBackend for ApiRemoteBackend {
    async fn get_authenticated_identity(&self) -> ServiceResult<Option<RemoteIdentity>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| ServiceError::Network(format!("Failed to fetch identity: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED || response.status() == StatusCode::FORBIDDEN {
            debug!("Remote session is no longer valid");
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;
        let identity = response
            .json::<RemoteIdentity>()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("Failed to parse identity response: {}", e)))?;
        Ok(Some(identity))
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: Option<&str>) -> ServiceResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("Upserting {} rows into {}", rows.len(), table);

        let mut url = self.table_url(table);
        if let Some(column) = on_conflict {
            url = format!("{}?on_conflict={}", url, urlencoding::encode(column));
        }
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| ServiceError::Network(format!("Failed to push {}: {}", table, e)))?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn delete_where_id_in(&self, table: &str, ids: &[String]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!("Deleting {} rows from {}", ids.len(), table);

        let filter = format!("in.({})", ids.join(","));
        let url = format!("{}?id={}", self.table_url(table), urlencoding::encode(&filter));
        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ServiceError::Network(format!("Failed to delete from {}: {}", table, e)))?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn check_connection(&self) -> ServiceResult<bool> {
        let url = format!("{}?select=id&limit=1", self.table_url("app_logs"));
        match self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header())
            .send()
            .await
        {
            Ok(response) => match Self::ensure_success(response).await {
                Ok(_) => Ok(true),
                Err(e) => {
                    debug!("Remote answered the reachability check with an error: {}", e);
                    Ok(false)
                }
            },
            Err(e) => {
                debug!("Reachability check failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// Calls observed by [`MockRemoteBackend`], in order.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Identity,
    Upsert {
        table: String,
        rows: Vec<Value>,
        on_conflict: Option<String>,
    },
    Delete {
        table: String,
        ids: Vec<String>,
    },
    ConnectionCheck,
}

/// Mock implementation for testing
#[cfg(test)]
#[derive(Default)]
pub struct MockRemoteBackend {
    identity: std::sync::Mutex<Option<RemoteIdentity>>,
    identity_delay: std::sync::Mutex<Option<Duration>>,
    calls: std::sync::Mutex<Vec<RemoteCall>>,
    failing_upserts: std::sync::Mutex<std::collections::HashSet<String>>,
    failing_deletes: std::sync::Mutex<std::collections::HashSet<String>>,
    upsert_gate: std::sync::Mutex<Option<UpsertGate>>,
}

/// Holds upserts to one table until released.
#[cfg(test)]
#[derive(Clone)]
pub struct UpsertGate {
    pub table: String,
    pub entered: std::sync::Arc<tokio::sync::Notify>,
    pub release: std::sync::Arc<tokio::sync::Notify>,
}

#[cfg(test)]
impl MockRemoteBackend {
    pub fn with_identity(user_id: &str) -> Self {
        let backend = Self::default();
        *backend.identity.lock().unwrap() = Some(RemoteIdentity {
            id: user_id.to_string(),
            email: None,
        });
        backend
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set_identity_delay(&self, delay: Duration) {
        *self.identity_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_upserts_to(&self, table: &str) {
        self.failing_upserts.lock().unwrap().insert(table.to_string());
    }

    pub fn fail_deletes_from(&self, table: &str) {
        self.failing_deletes.lock().unwrap().insert(table.to_string());
    }

    /// Make the next upserts to `table` wait for `release` after signalling `entered`.
    pub fn hold_upserts_to(&self, table: &str) -> UpsertGate {
        let gate = UpsertGate {
            table: table.to_string(),
            entered: std::sync::Arc::new(tokio::sync::Notify::new()),
            release: std::sync::Arc::new(tokio::sync::Notify::new()),
        };
        *self.upsert_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn heal(&self) {
        self.failing_upserts.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Tables touched by upserts, in call order.
    pub fn upserted_tables(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Upsert { table, .. } => Some(table),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl RemoteBackend for MockRemoteBackend {
    async fn get_authenticated_identity(&self) -> ServiceResult<Option<RemoteIdentity>> {
        self.calls.lock().unwrap().push(RemoteCall::Identity);
        let delay = *self.identity_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.identity.lock().unwrap().clone())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: Option<&str>) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(RemoteCall::Upsert {
            table: table.to_string(),
            rows,
            on_conflict: on_conflict.map(str::to_string),
        });
        let gate = self.upsert_gate.lock().unwrap().clone();
        if let Some(gate) = gate.filter(|gate| gate.table == table) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.failing_upserts.lock().unwrap().contains(table) {
            return Err(ServiceError::ExternalService(format!(
                "Server returned error 400 Bad Request: rejected {}",
                table
            )));
        }
        Ok(())
    }

    async fn delete_where_id_in(&self, table: &str, ids: &[String]) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(RemoteCall::Delete {
            table: table.to_string(),
            ids: ids.to_vec(),
        });
        if self.failing_deletes.lock().unwrap().contains(table) {
            return Err(ServiceError::ExternalService(format!(
                "Server returned error 500 Internal Server Error: {}",
                table
            )));
        }
        Ok(())
    }

    async fn check_connection(&self) -> ServiceResult<bool> {
        self.calls.lock().unwrap().push(RemoteCall::ConnectionCheck);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP reply and returns the base url.
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]",
                status_line
            );
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn backend(base_url: &str) -> ApiRemoteBackend {
        ApiRemoteBackend::new(base_url, "anon-key", Duration::from_secs(5), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn connection_check_accepts_a_2xx_reply() {
        let base = serve_once("200 OK").await;
        assert!(backend(&base).check_connection().await.unwrap());
    }

    #[tokio::test]
    async fn connection_check_rejects_an_error_reply() {
        let base = serve_once("401 Unauthorized").await;
        assert!(!backend(&base).check_connection().await.unwrap());

        let base = serve_once("503 Service Unavailable").await;
        assert!(!backend(&base).check_connection().await.unwrap());
    }

    #[tokio::test]
    async fn connection_check_reports_an_unreachable_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        assert!(!backend(&base).check_connection().await.unwrap());
    }
}
