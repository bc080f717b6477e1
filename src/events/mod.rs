//! Dispatch of ledger confirmations to the reconciler
//!
//! Events are reconciled one at a time in arrival order. A failed event is
//! logged and handed to the escalation channel; it is never retried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::AssetError;
use crate::instances::{AssetInstanceService, Reconciliation};
use crate::types::{AssetInstanceCreated, LedgerEvent};

/// A confirmation that could not be reconciled
#[derive(Debug)]
pub struct EventFailure {
    pub event: LedgerEvent,
    pub error: AssetError,
}

/// Counters for a dispatcher run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub reconciled: usize,
    pub failed: usize,
}

pub struct EventDispatcher {
    service: Arc<AssetInstanceService>,
    escalation: Option<mpsc::UnboundedSender<EventFailure>>,
    reconciled: AtomicUsize,
    failed: AtomicUsize,
    shutdown_tx: watch::Sender<bool>,
}

impl EventDispatcher {
    pub fn new(service: Arc<AssetInstanceService>) -> Arc<Self> {
        Self::build(service, None)
    }

    /// A dispatcher that forwards every failure to `escalation`
    pub fn with_escalation(
        service: Arc<AssetInstanceService>,
        escalation: mpsc::UnboundedSender<EventFailure>,
    ) -> Arc<Self> {
        Self::build(service, Some(escalation))
    }

    fn build(
        service: Arc<AssetInstanceService>,
        escalation: Option<mpsc::UnboundedSender<EventFailure>>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            service,
            escalation,
            reconciled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            shutdown_tx,
        })
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            reconciled: self.reconciled.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Ask the dispatch loop to end. The request sticks, so a dispatcher
    /// stopped before [`start`](Self::start) exits as soon as it starts.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Reconcile a single wire event. Failures are escalated and yield `None`.
    pub async fn process(&self, event: LedgerEvent) -> Option<Reconciliation> {
        let outcome = match AssetInstanceCreated::try_from(event.clone()) {
            Ok(created) => self.service.reconcile_confirmation_event(&created).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reconciliation) => {
                self.reconciled.fetch_add(1, Ordering::SeqCst);
                Some(reconciliation)
            }
            Err(error) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                if error.is_fatal() {
                    log::error!(
                        "Fatal error reconciling asset instance {}: {}",
                        event.asset_instance_id,
                        error
                    );
                } else {
                    log::warn!(
                        "Failed to reconcile asset instance {}: {}",
                        event.asset_instance_id,
                        error
                    );
                }
                if let Some(escalation) = &self.escalation {
                    if escalation.send(EventFailure { event, error }).is_err() {
                        log::error!("Escalation channel closed; failure reported only in the log");
                    }
                }
                None
            }
        }
    }

    /// Consume `events` until the channel closes or [`stop`](Self::stop) is
    /// called. The task yields the stats accumulated so far.
    pub fn start(self: &Arc<Self>, events: mpsc::Receiver<LedgerEvent>) -> JoinHandle<DispatchStats> {
        let dispatcher = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut events = events;
            while !*shutdown.borrow_and_update() {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    received = events.recv() => match received {
                        Some(event) => {
                            dispatcher.process(event).await;
                        }
                        None => {
                            log::debug!("Ledger event channel closed");
                            break;
                        }
                    },
                }
            }
            dispatcher.stats()
        })
    }
}
