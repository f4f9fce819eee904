use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::keys;
use crate::domains::session::types::{EntryDraft, UserSession};
use crate::errors::{DomainResult, ValidationError};
use std::sync::Arc;

/// Operator session and new-entry draft.
pub struct SessionRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
}

impl SessionRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    pub async fn current(&self) -> DomainResult<Option<UserSession>> {
        self.store.load_value(keys::SESSION).await
    }

    /// Start (or switch to) a session for `operator_name`.
    ///
    /// Re-starting the session of the operator already logged in keeps the
    /// original login time and writes no audit entry.
    pub async fn start_session(&self, operator_name: &str) -> DomainResult<UserSession> {
        let operator_name = operator_name.trim();
        if operator_name.is_empty() {
            return Err(ValidationError::required("operator_name").into());
        }

        if let Some(existing) = self.current().await? {
            if existing.operator_name == operator_name {
                return Ok(existing);
            }
        }

        let session = UserSession {
            operator_name: operator_name.to_string(),
            login_time: self.store.now(),
        };
        self.store.store_value(keys::SESSION, &session).await?;
        self.audit
            .append(
                LogModule::System,
                "Operator login",
                None,
                Some(format!("User {} authenticated.", operator_name)),
            )
            .await;
        Ok(session)
    }

    /// End the current session, if any. Returns the session that was closed.
    pub async fn end_session(&self) -> DomainResult<Option<UserSession>> {
        let Some(session) = self.current().await? else {
            return Ok(None);
        };
        self.audit
            .append(
                LogModule::System,
                "User switch",
                None,
                Some(format!("User {} signed out.", session.operator_name)),
            )
            .await;
        self.store.remove_value(keys::SESSION).await?;
        Ok(Some(session))
    }

    pub async fn get_draft(&self) -> DomainResult<Option<EntryDraft>> {
        self.store.load_value(keys::DRAFT).await
    }

    pub async fn save_draft(&self, form_data: serde_json::Value, step: u32) -> DomainResult<()> {
        self.store
            .store_value(keys::DRAFT, &EntryDraft { form_data, step })
            .await
    }

    pub async fn clear_draft(&self) -> DomainResult<()> {
        self.store.remove_value(keys::DRAFT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::collection::test_support::memory_store;

    fn setup() -> (SessionRepository, Arc<AuditLog>) {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        (SessionRepository::new(store, audit.clone()), audit)
    }

    #[tokio::test]
    async fn session_attributes_audit_entries() {
        let (sessions, audit) = setup();
        sessions.start_session("maria").await.unwrap();
        audit.append(LogModule::Gatehouse, "Test", None, None).await;

        let logs = audit.get_all().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|log| log.user == "maria"));

        sessions.end_session().await.unwrap();
        assert!(sessions.current().await.unwrap().is_none());
        audit.append(LogModule::Gatehouse, "After logout", None, None).await;
        let last = audit.recent(1).await.unwrap();
        assert_eq!(last[0].user, crate::domains::audit::repository::UNKNOWN_USER);
    }

    #[tokio::test]
    async fn restarting_same_operator_is_quiet() {
        let (sessions, audit) = setup();
        let first = sessions.start_session("maria").await.unwrap();
        let second = sessions.start_session("maria").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(audit.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_operator_is_rejected() {
        let (sessions, _) = setup();
        assert!(sessions.start_session("  ").await.is_err());
    }

    #[tokio::test]
    async fn draft_round_trip() {
        let (sessions, _) = setup();
        assert!(sessions.get_draft().await.unwrap().is_none());
        sessions
            .save_draft(serde_json::json!({ "driverName": "João" }), 2)
            .await
            .unwrap();
        let draft = sessions.get_draft().await.unwrap().unwrap();
        assert_eq!(draft.step, 2);
        sessions.clear_draft().await.unwrap();
        assert!(sessions.get_draft().await.unwrap().is_none());
    }
}
