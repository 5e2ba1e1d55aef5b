//! Repeating scan-and-notify with dynamic interval and subscriber fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::PortEntry;
use crate::scanner::{PortScanner, Scanner};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

type Callback = Arc<dyn Fn(&[PortEntry]) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// State shared with the polling task and with live [`Subscription`] tokens.
struct Shared {
    subscribers: RwLock<Vec<Subscriber>>,
    interval_ms: AtomicU64,
    rearm: Notify,
}

/// Repeatedly invokes the scanner on a timer and fans successful results
/// out to subscribers.
///
/// Ticks are serialized: a scan still in flight delays the next tick rather
/// than overlapping it, so subscribers always observe results in scan order.
/// Failed scans are swallowed here (no subscriber is invoked) and the timer
/// carries on; callers that need the error hold the scanner directly.
///
/// `start` must be called from within a Tokio runtime.
pub struct PollingManager<S = PortScanner> {
    scanner: Arc<S>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl PollingManager<PortScanner> {
    /// Create a polling manager over the platform scanner with the default
    /// interval.
    pub fn new() -> Self {
        Self::with_scanner(PortScanner::new(), DEFAULT_POLL_INTERVAL)
    }
}

impl Default for PollingManager<PortScanner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scanner + 'static> PollingManager<S> {
    /// Create a polling manager over any scanner.
    pub fn with_scanner(scanner: S, interval: Duration) -> Self {
        Self {
            scanner: Arc::new(scanner),
            shared: Arc::new(Shared {
                subscribers: RwLock::new(Vec::new()),
                interval_ms: AtomicU64::new(interval.as_millis() as u64),
                rearm: Notify::new(),
            }),
            task: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Start polling: one immediate scan-and-notify, then one per interval.
    ///
    /// No-op if already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let scanner = Arc::clone(&self.scanner);
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            loop {
                scan_and_notify(scanner.as_ref(), &shared).await;

                // Sleep until the next tick; set_interval abandons an
                // in-flight sleep and re-arms at the new length.
                loop {
                    let ms = shared.interval_ms.load(Ordering::SeqCst);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => break,
                        _ = shared.rearm.notified() => continue,
                    }
                }
            }
        }));
    }

    /// Stop polling. Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Whether the polling task is currently armed.
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Update the poll interval.
    ///
    /// If running, the timer is re-armed immediately at the new interval
    /// instead of waiting out the remainder of the old one.
    pub fn set_interval(&self, interval: Duration) {
        self.shared
            .interval_ms
            .store(interval.as_millis() as u64, Ordering::SeqCst);
        self.shared.rearm.notify_waiters();
    }

    /// The current poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::SeqCst))
    }

    /// Register a subscriber invoked with every successful scan result, in
    /// registration order.
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[PortEntry]) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.subscribers.write().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<S> Drop for PollingManager<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// Unsubscribe token returned by [`PollingManager::on_update`].
///
/// `unsubscribe` removes exactly the subscriber it was issued for and is an
/// idempotent no-op afterwards.
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.write().retain(|s| s.id != self.id);
        }
    }
}

async fn scan_and_notify<S: Scanner>(scanner: &S, shared: &Shared) {
    match scanner.scan().await {
        Ok(entries) => {
            // Snapshot so callbacks run outside the lock and may themselves
            // subscribe or unsubscribe.
            let callbacks: Vec<Callback> = shared
                .subscribers
                .read()
                .iter()
                .map(|s| Arc::clone(&s.callback))
                .collect();
            for callback in callbacks {
                callback(&entries);
            }
        }
        Err(error) => {
            debug!(error = %error, "Scan failed; subscribers not notified");
        }
    }
}
