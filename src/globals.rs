use crate::auth::acquire_identity_with_timeout;
use crate::config::CoreConfig;
use crate::domains::core::sqlite_storage::SqliteKeyValueStorage;
use crate::domains::sync::{ApiRemoteBackend, AutoSyncScheduler, ConnectivityMonitor, SchedulerHandle, SyncService, SyncServiceImpl};
use crate::ffi::error::{FFIError, FFIResult};
use crate::store::RecordStore;
use crate::utils::clock::SystemClock;
use lazy_static::lazy_static;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);
    static ref CONFIG: Mutex<Option<CoreConfig>> = Mutex::new(None);

    static ref RECORD_STORE: Mutex<Option<Arc<RecordStore>>> = Mutex::new(None);
    static ref CONNECTIVITY: Mutex<Option<Arc<ConnectivityMonitor>>> = Mutex::new(None);

    // Remote side, absent when no API URL or key is configured
    static ref REMOTE_BACKEND: Mutex<Option<Arc<ApiRemoteBackend>>> = Mutex::new(None);
    static ref SYNC_SERVICE: Mutex<Option<Arc<dyn SyncService>>> = Mutex::new(None);
    static ref SYNC_SCHEDULER: Mutex<Option<SchedulerHandle>> = Mutex::new(None);
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

pub fn get_db_pool() -> FFIResult<SqlitePool> {
    DB_POOL.lock().map_err(|_| FFIError::internal("DB_POOL lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("Database pool"))
}
pub fn get_config() -> FFIResult<CoreConfig> {
    CONFIG.lock().map_err(|_| FFIError::internal("CONFIG lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("Configuration"))
}
pub fn get_record_store() -> FFIResult<Arc<RecordStore>> {
    RECORD_STORE.lock().map_err(|_| FFIError::internal("RECORD_STORE lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("RecordStore"))
}
pub fn get_connectivity() -> FFIResult<Arc<ConnectivityMonitor>> {
    CONNECTIVITY.lock().map_err(|_| FFIError::internal("CONNECTIVITY lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("ConnectivityMonitor"))
}

/// `None` when the remote side is not configured.
pub fn get_remote_backend() -> FFIResult<Option<Arc<ApiRemoteBackend>>> {
    Ok(REMOTE_BACKEND.lock().map_err(|_| FFIError::internal("REMOTE_BACKEND lock poisoned".to_string()))?.clone())
}

/// `None` when the remote side is not configured.
pub fn get_sync_service() -> FFIResult<Option<Arc<dyn SyncService>>> {
    Ok(SYNC_SERVICE.lock().map_err(|_| FFIError::internal("SYNC_SERVICE lock poisoned".to_string()))?.clone())
}

/// Record the host's reachability signal.
pub fn set_online(online: bool) -> FFIResult<()> {
    let monitor = get_connectivity()?;
    if monitor.set_online(online) {
        log::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
    }
    // The scheduler forwards changes too, but it only runs while signed in.
    if let Some(service) = get_sync_service()? {
        service.set_online(online);
    }
    Ok(())
}

/// Initialize global services
pub async fn initialize(config: CoreConfig) -> FFIResult<()> {
    // Acquire the async mutex to ensure single initialization
    let _guard = INIT_MUTEX.lock().await;

    if INITIALIZED.load(Ordering::Acquire) {
        log::debug!("Core already initialized");
        return Ok(());
    }

    let result = initialize_internal(config).await;

    // Mark as initialized only if successful
    if result.is_ok() {
        INITIALIZED.store(true, Ordering::Release);
    }

    result
}

async fn initialize_internal(config: CoreConfig) -> FFIResult<()> {
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    log::info!("Starting internal initialization");
    log::debug!("Database URL: {}", config.database_url);

    // In-memory SQLite is per connection
    let max_connections = if config.database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| FFIError::internal(format!("Database connection failed: {}", e)))?;

    crate::db_migration::initialize_database(&pool).await?;
    log::debug!("Database schema is current");

    let storage = SqliteKeyValueStorage::with_capacity(pool.clone(), config.storage_capacity);
    let store = Arc::new(RecordStore::new(Arc::new(storage), Arc::new(SystemClock)));

    if let Some(device_name) = &config.device_name {
        let mut settings = store.settings.get().await?;
        if &settings.device_name != device_name {
            log::info!("Device name set to '{}'", device_name);
            settings.device_name = device_name.clone();
            store.settings.save(settings).await?;
        }
    }

    let connectivity = Arc::new(ConnectivityMonitor::new(true));

    let (remote, sync_service) = match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => {
            let remote = Arc::new(ApiRemoteBackend::new(url, key, config.request_timeout, config.connect_timeout));
            remote.set_access_token(config.access_token.clone());
            let service: Arc<dyn SyncService> = Arc::new(SyncServiceImpl::new(
                store.collections.clone(),
                store.deletions.clone(),
                store.settings.clone(),
                remote.clone(),
            ));
            (Some(remote), Some(service))
        }
        _ => {
            log::warn!("Remote backend not configured, sync is unavailable");
            (None, None)
        }
    };

    *DB_POOL.lock().map_err(|_| FFIError::internal("DB_POOL lock poisoned".to_string()))? = Some(pool);
    *CONFIG.lock().map_err(|_| FFIError::internal("CONFIG lock poisoned".to_string()))? = Some(config);
    *RECORD_STORE.lock().map_err(|_| FFIError::internal("RECORD_STORE lock poisoned".to_string()))? = Some(store);
    *CONNECTIVITY.lock().map_err(|_| FFIError::internal("CONNECTIVITY lock poisoned".to_string()))? = Some(connectivity);
    *REMOTE_BACKEND.lock().map_err(|_| FFIError::internal("REMOTE_BACKEND lock poisoned".to_string()))? = remote;
    *SYNC_SERVICE.lock().map_err(|_| FFIError::internal("SYNC_SERVICE lock poisoned".to_string()))? = sync_service;

    ensure_auto_sync().await?;

    log::info!("Core initialization complete");
    Ok(())
}

/// Start the auto-sync scheduler when it is not running and a remote identity is available.
pub async fn ensure_auto_sync() -> FFIResult<bool> {
    {
        let scheduler = SYNC_SCHEDULER.lock().map_err(|_| FFIError::internal("SYNC_SCHEDULER lock poisoned".to_string()))?;
        if scheduler.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return Ok(true);
        }
    }

    let (Some(remote), Some(service)) = (get_remote_backend()?, get_sync_service()?) else {
        return Ok(false);
    };
    let config = get_config()?;

    let identity = acquire_identity_with_timeout(remote.as_ref(), config.identity_timeout).await;
    let Some(identity) = identity else {
        log::info!("No remote identity, auto-sync stays off");
        return Ok(false);
    };

    log::info!("Starting auto-sync for remote account {}", identity.id);
    let handle = AutoSyncScheduler::new(service, get_connectivity()?.subscribe(), config.sync_interval).start();
    let previous = SYNC_SCHEDULER
        .lock()
        .map_err(|_| FFIError::internal("SYNC_SCHEDULER lock poisoned".to_string()))?
        .replace(handle);
    drop(previous);
    Ok(true)
}

/// Swap the remote session token. Signing out stops automatic passes.
pub async fn set_access_token(token: Option<String>) -> FFIResult<bool> {
    let Some(remote) = get_remote_backend()? else {
        return Err(FFIError::new(
            crate::ffi::error::ErrorCode::ConfigurationError,
            "Remote backend is not configured",
        ));
    };
    let signed_out = token.is_none();
    remote.set_access_token(token);

    if signed_out {
        let handle = SYNC_SCHEDULER
            .lock()
            .map_err(|_| FFIError::internal("SYNC_SCHEDULER lock poisoned".to_string()))?
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        return Ok(false);
    }
    ensure_auto_sync().await
}
