//! Background trigger for sync passes: a fixed interval plus every offline to online transition.

use crate::domains::sync::service::SyncService;
use crate::domains::sync::types::SyncOutcome;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default pause between automatic passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Publishes the host's reachability signal.
pub struct ConnectivityMonitor {
    sender: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self { sender }
    }

    /// Record the current state. Returns true when it changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Messages accepted by a running scheduler.
#[derive(Debug)]
pub enum SyncSchedulerMessage {
    /// Run a pass now and report its outcome.
    SyncNow {
        response: oneshot::Sender<SyncOutcome>,
    },
    /// Stop the loop after the current pass.
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// Handle to a running scheduler. Dropping it stops the loop.
pub struct SchedulerHandle {
    sender: mpsc::Sender<SyncSchedulerMessage>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn sync_now(&self) -> Option<SyncOutcome> {
        let (response, rx) = oneshot::channel();
        self.sender.send(SyncSchedulerMessage::SyncNow { response }).await.ok()?;
        rx.await.ok()
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn shutdown(self) {
        let (response, rx) = oneshot::channel();
        if self.sender.send(SyncSchedulerMessage::Shutdown { response }).await.is_ok() {
            let _ = rx.await;
        }
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub struct AutoSyncScheduler {
    service: Arc<dyn SyncService>,
    connectivity: watch::Receiver<bool>,
    interval: Duration,
}

impl AutoSyncScheduler {
    pub fn new(service: Arc<dyn SyncService>, connectivity: watch::Receiver<bool>, interval: Duration) -> Self {
        Self {
            service,
            connectivity,
            interval,
        }
    }

    /// Spawn the loop on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let (sender, receiver) = mpsc::channel(16);
        let join = tokio::spawn(self.run(receiver));
        SchedulerHandle { sender, join }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<SyncSchedulerMessage>) {
        info!("Auto-sync scheduler started, interval {:?}", self.interval);

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_online = *self.connectivity.borrow_and_update();
        let mut connectivity_open = true;

        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(SyncSchedulerMessage::SyncNow { response }) => {
                        let outcome = self.service.sync_all(None).await;
                        let _ = response.send(outcome);
                    }
                    Some(SyncSchedulerMessage::Shutdown { response }) => {
                        let _ = response.send(());
                        break;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.service.is_online() {
                        self.run_pass("interval").await;
                    } else {
                        debug!("Scheduled sync skipped while offline");
                    }
                }
                changed = self.connectivity.changed(), if connectivity_open => {
                    if changed.is_err() {
                        connectivity_open = false;
                        continue;
                    }
                    let online = *self.connectivity.borrow_and_update();
                    self.service.set_online(online);
                    if online && !was_online {
                        self.run_pass("reconnect").await;
                    }
                    was_online = online;
                }
            }
        }

        info!("Auto-sync scheduler stopped");
    }

    async fn run_pass(&self, trigger: &str) {
        let outcome = self.service.sync_all(None).await;
        if outcome.success {
            debug!("Automatic sync ({}) finished: {}", trigger, outcome.message);
        } else if outcome.is_soft_failure() {
            debug!("Automatic sync ({}) skipped: {}", trigger, outcome.message);
        } else {
            warn!("Automatic sync ({}) failed: {}", trigger, outcome.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sync::types::{SyncStats, SyncStatus};
    use crate::domains::sync::service::StatusCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSyncService {
        passes: AtomicUsize,
        online: AtomicBool,
    }

    impl MockSyncService {
        fn online() -> Arc<Self> {
            let service = Self::default();
            service.online.store(true, Ordering::SeqCst);
            Arc::new(service)
        }

        fn passes(&self) -> usize {
            self.passes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SyncService for MockSyncService {
        async fn sync_all(&self, on_status: Option<StatusCallback>) -> SyncOutcome {
            self.passes.fetch_add(1, Ordering::SeqCst);
            if let Some(callback) = on_status {
                callback(SyncStatus::Success);
            }
            SyncOutcome::completed(SyncStats::default())
        }

        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn monitor_reports_only_real_changes() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_pass_every_interval() {
        let service = MockSyncService::online();
        let monitor = ConnectivityMonitor::default();
        let handle = AutoSyncScheduler::new(service.clone(), monitor.subscribe(), Duration::from_secs(60)).start();

        settle().await;
        assert_eq!(service.passes(), 0);

        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(service.passes(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(service.passes(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnecting_triggers_a_pass_immediately() {
        let service = MockSyncService::online();
        let monitor = ConnectivityMonitor::new(true);
        let handle = AutoSyncScheduler::new(service.clone(), monitor.subscribe(), DEFAULT_SYNC_INTERVAL).start();
        settle().await;

        monitor.set_online(false);
        settle().await;
        assert!(!service.is_online());
        assert_eq!(service.passes(), 0);

        monitor.set_online(true);
        settle().await;
        assert!(service.is_online());
        assert_eq!(service.passes(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_pass_is_skipped_while_offline() {
        let service = MockSyncService::online();
        service.set_online(false);
        let monitor = ConnectivityMonitor::new(false);
        let handle = AutoSyncScheduler::new(service.clone(), monitor.subscribe(), Duration::from_secs(60)).start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(service.passes(), 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn sync_now_returns_the_outcome_and_drop_stops_the_loop() {
        let service = MockSyncService::online();
        let monitor = ConnectivityMonitor::default();
        let handle = AutoSyncScheduler::new(service.clone(), monitor.subscribe(), DEFAULT_SYNC_INTERVAL).start();

        let outcome = handle.sync_now().await.unwrap();
        assert!(outcome.success);
        assert_eq!(service.passes(), 1);

        let SchedulerHandle { sender, join } = handle;
        drop(sender);
        join.await.unwrap();
    }
}
