use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::engine::lifecycle::DeliveryLifecycle;
use crate::engine::pay::PayRates;
use crate::engine::proof::{NoTamperSignal, TamperDetector};
use crate::models::dispute::{DisputeRecord, OrderConfirmation};
use crate::models::event::LifecycleEvent;
use crate::models::receipt::ReceiptVerification;
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub lifecycle: DeliveryLifecycle<MemoryStore>,
    pub clock: Arc<dyn Clock>,
    pub tamper_detector: Arc<dyn TamperDetector>,
    pub receipts: DashMap<Uuid, ReceiptVerification>,
    /// Receipt image hash to the request it was first submitted for.
    pub receipt_hashes: DashMap<String, Uuid>,
    pub confirmations: DashMap<Uuid, OrderConfirmation>,
    pub disputes: DashMap<Uuid, Vec<DisputeRecord>>,
    pub lifecycle_events_tx: broadcast::Sender<LifecycleEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, pay_rates: PayRates) -> Self {
        Self::with_clock(event_buffer_size, pay_rates, Arc::new(SystemClock))
    }

    pub fn with_clock(event_buffer_size: usize, pay_rates: PayRates, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (lifecycle_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            lifecycle: DeliveryLifecycle::new(store.clone(), clock.clone(), pay_rates),
            store,
            clock,
            tamper_detector: Arc::new(NoTamperSignal),
            receipts: DashMap::new(),
            receipt_hashes: DashMap::new(),
            confirmations: DashMap::new(),
            disputes: DashMap::new(),
            lifecycle_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Publishes to websocket subscribers; having none is not an error.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.lifecycle_events_tx.send(event);
    }
}
