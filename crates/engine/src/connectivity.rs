//! Network reachability as seen by the command executor.
//!
//! A monitor that is wrong is tolerated: an "online" answer while the
//! network is actually gone just sends the command down the remote-failure
//! path, which rolls back.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clipsync_core::ConnectivitySettings;
use tokio::sync::watch;

/// Current reachability plus a stream of committed transitions.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every committed transition. Callers typically
    /// wait on it to trigger a drain when the value turns `true`.
    fn watch(&self) -> watch::Receiver<bool>;
}

impl<T: Connectivity + ?Sized> Connectivity for Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        (**self).watch()
    }
}

/// Reachability set explicitly by the host.
#[derive(Debug)]
pub struct ManualConnectivity {
    state: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        ManualConnectivity {
            state: watch::Sender::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
    }
}

impl Connectivity for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Debounces raw platform reachability signals.
///
/// A reported value only becomes the committed state after it has held for
/// the whole window. Reporting the committed value again cancels a pending
/// transition, so a signal that flaps inside the window never surfaces.
/// Reporting the value that is already pending does not restart the window.
///
/// `report` spawns a timer and must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct DebouncedConnectivity {
    inner: Arc<Debounce>,
}

#[derive(Debug)]
struct Debounce {
    state: watch::Sender<bool>,
    window: Duration,
    pending: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    target: Option<bool>,
    generation: u64,
}

impl DebouncedConnectivity {
    pub fn new(initially_online: bool, window: Duration) -> Self {
        DebouncedConnectivity {
            inner: Arc::new(Debounce {
                state: watch::Sender::new(initially_online),
                window,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    /// Debounce window taken from `[connectivity] debounce_ms`.
    pub fn from_settings(initially_online: bool, settings: &ConnectivitySettings) -> Self {
        Self::new(initially_online, Duration::from_millis(settings.debounce_ms))
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Feed one raw signal from the platform.
    pub fn report(&self, online: bool) {
        let generation = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *self.inner.state.borrow() == online {
                if pending.target.take().is_some() {
                    pending.generation += 1;
                    tracing::debug!(online, "connectivity flap absorbed");
                }
                return;
            }
            if pending.target == Some(online) {
                return;
            }
            pending.target = Some(online);
            pending.generation += 1;
            pending.generation
        };

        if self.inner.window.is_zero() {
            self.inner.commit(generation, online);
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.commit(generation, online);
        });
    }
}

impl Debounce {
    fn commit(&self, generation: u64, online: bool) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.generation != generation || pending.target != Some(online) {
            return;
        }
        pending.target = None;
        self.state.send_replace(online);
        tracing::info!(online, "connectivity changed");
    }
}

impl Connectivity for DebouncedConnectivity {
    fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }
}
