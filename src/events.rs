//! Notifications emitted after a ledger change commits
use super::state::Action;
use super::types::{Address, AssetId};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Harvested {
        asset_id: AssetId,
        producer: Address,
        location: String,
        digest: String,
    },
    Processed {
        asset_id: AssetId,
        producer: Address,
        location: String,
        digest: String,
    },
    Packaged {
        asset_id: AssetId,
        producer: Address,
        location: String,
        digest: String,
    },
    ListedForSale {
        asset_id: AssetId,
        producer: Address,
        digest: String,
    },
    Sold {
        asset_id: AssetId,
        producer: Address,
        distributor: Address,
        digest: String,
    },
    Shipped {
        asset_id: AssetId,
        distributor: Address,
        location: String,
        digest: String,
    },
    Received {
        asset_id: AssetId,
        retailer: Address,
        location: String,
        digest: String,
    },
    Purchased {
        asset_id: AssetId,
        consumer: Address,
        digest: String,
    },
    Paused {
        by: Address,
    },
    Unpaused {
        by: Address,
    },
}

impl LedgerEvent {
    // `digest` is the sha256 of the record after the transition
    pub(crate) fn transition(
        action: Action,
        asset_id: AssetId,
        caller: Address,
        counterpart: Option<Address>,
        location: Option<&str>,
        digest: String,
    ) -> Self {
        let location = location.unwrap_or_default().to_owned();
        match action {
            Action::Harvest => LedgerEvent::Harvested {
                asset_id,
                producer: caller,
                location,
                digest,
            },
            Action::Process => LedgerEvent::Processed {
                asset_id,
                producer: caller,
                location,
                digest,
            },
            Action::Package => LedgerEvent::Packaged {
                asset_id,
                producer: caller,
                location,
                digest,
            },
            Action::ListForSale => LedgerEvent::ListedForSale {
                asset_id,
                producer: caller,
                digest,
            },
            Action::Sell => LedgerEvent::Sold {
                asset_id,
                producer: caller,
                distributor: counterpart.unwrap_or_default(),
                digest,
            },
            Action::Ship => LedgerEvent::Shipped {
                asset_id,
                distributor: caller,
                location,
                digest,
            },
            Action::Receive => LedgerEvent::Received {
                asset_id,
                retailer: caller,
                location,
                digest,
            },
            Action::Purchase => LedgerEvent::Purchased {
                asset_id,
                consumer: caller,
                digest,
            },
        }
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            LedgerEvent::Harvested { asset_id, .. }
            | LedgerEvent::Processed { asset_id, .. }
            | LedgerEvent::Packaged { asset_id, .. }
            | LedgerEvent::ListedForSale { asset_id, .. }
            | LedgerEvent::Sold { asset_id, .. }
            | LedgerEvent::Shipped { asset_id, .. }
            | LedgerEvent::Received { asset_id, .. }
            | LedgerEvent::Purchased { asset_id, .. } => Some(*asset_id),
            LedgerEvent::Paused { .. } | LedgerEvent::Unpaused { .. } => None,
        }
    }
}

/// Receiver of ledger notifications, typically an off-chain indexer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _: &LedgerEvent) {}
}

/// Keeps every event in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn take(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
