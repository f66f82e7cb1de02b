//! Role-gated supply chain ledger for produce batches.
//!
//! A batch moves `Harvested → Processed → Packaged → ForSale → Sold → Shipped
//! → Received → Purchased`. Each step is one call on [`SupplyChainLedger`],
//! checked against a [`CapabilityDirectory`] and an [`AssetRegistry`] and
//! committed atomically to sled.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod ledger;
pub mod registry;
pub mod state;
mod storage;
pub mod types;
pub mod utils;

pub use directory::CapabilityDirectory;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::SupplyChainLedger;
pub use registry::AssetRegistry;
pub use state::{Action, ProvenanceEntry, SupplyChainRecord, SupplyState};
pub use types::{Address, AssetId, Capability, Role, TimeStamp};
