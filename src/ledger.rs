//! Service layer API for the supply chain state machine
use super::clock::{HostClock, SystemClock};
use super::config::{self, LedgerConfig};
use super::directory::CapabilityDirectory;
use super::error::{LedgerError, LedgerResult, RegistryError};
use super::events::{EventSink, LedgerEvent, NullSink};
use super::forwarder::{CallerResolver, DirectCaller, Envelope};
use super::registry::AssetRegistry;
use super::state::{Action, ProvenanceEntry, SupplyChainRecord, SupplyState};
use super::storage::{self, TxResult, TxStore, abort};
use super::types::{Address, AssetId, Capability, Role, TimeStamp};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SupplyChainLedger {
    instance: Arc<sled::Db>,
    directory: Arc<dyn CapabilityDirectory>,
    registry: Arc<dyn AssetRegistry>,
    resolver: Arc<dyn CallerResolver>,
    clock: Arc<dyn HostClock>,
    events: Arc<dyn EventSink>,
    config: LedgerConfig,
}

// arguments of a single transition, borrowed for the life of the transaction
struct Step<'a> {
    action: Action,
    asset_id: AssetId,
    caller: Address,
    location: Option<&'a str>,
    note: &'a str,
    counterpart: Option<Address>,
}

impl SupplyChainLedger {
    pub fn new(
        instance: Arc<sled::Db>,
        directory: Arc<dyn CapabilityDirectory>,
        registry: Arc<dyn AssetRegistry>,
    ) -> Self {
        Self {
            instance,
            directory,
            registry,
            resolver: Arc::new(DirectCaller),
            clock: Arc::new(SystemClock),
            events: Arc::new(NullSink),
            config: LedgerConfig::default(),
        }
    }

    /// Opens the database named by `config` and builds a ledger over it.
    pub fn open(
        config: LedgerConfig,
        directory: Arc<dyn CapabilityDirectory>,
        registry: Arc<dyn AssetRegistry>,
    ) -> LedgerResult<Self> {
        let instance = config::open_db(&config)?;
        Ok(Self::new(instance, directory, registry).set_config(config))
    }

    pub fn set_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }
    pub fn set_clock(mut self, clock: Arc<dyn HostClock>) -> Self {
        self.clock = clock;
        self
    }
    pub fn set_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
    pub fn set_resolver(mut self, resolver: Arc<dyn CallerResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolves who is really asking, looking through any trusted relay.
    /// Do this once at the boundary and pass the result to the operations.
    pub fn effective_caller(&self, envelope: &Envelope) -> Address {
        self.resolver.effective_caller(envelope)
    }

    /// Creates the record for a freshly minted batch.
    pub fn harvest(
        &self,
        caller: Address,
        asset_id: AssetId,
        location: &str,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Harvest,
            asset_id,
            caller,
            location: Some(location),
            note,
            counterpart: None,
        })
    }

    pub fn process(
        &self,
        caller: Address,
        asset_id: AssetId,
        location: &str,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Process,
            asset_id,
            caller,
            location: Some(location),
            note,
            counterpart: None,
        })
    }

    pub fn package(
        &self,
        caller: Address,
        asset_id: AssetId,
        location: &str,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Package,
            asset_id,
            caller,
            location: Some(location),
            note,
            counterpart: None,
        })
    }

    pub fn list_for_sale(
        &self,
        caller: Address,
        asset_id: AssetId,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::ListForSale,
            asset_id,
            caller,
            location: None,
            note,
            counterpart: None,
        })
    }

    /// Sells the batch to `distributor`, who becomes the only address allowed
    /// to ship it.
    pub fn sell(
        &self,
        caller: Address,
        asset_id: AssetId,
        distributor: Address,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Sell,
            asset_id,
            caller,
            location: None,
            note,
            counterpart: Some(distributor),
        })
    }

    pub fn ship(
        &self,
        caller: Address,
        asset_id: AssetId,
        location: &str,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Ship,
            asset_id,
            caller,
            location: Some(location),
            note,
            counterpart: None,
        })
    }

    pub fn receive(
        &self,
        caller: Address,
        asset_id: AssetId,
        location: &str,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Receive,
            asset_id,
            caller,
            location: Some(location),
            note,
            counterpart: None,
        })
    }

    pub fn purchase(
        &self,
        caller: Address,
        asset_id: AssetId,
        note: &str,
    ) -> LedgerResult<SupplyChainRecord> {
        self.transition(Step {
            action: Action::Purchase,
            asset_id,
            caller,
            location: None,
            note,
            counterpart: None,
        })
    }

    /// Blocks every transition until [`SupplyChainLedger::unpause`].
    pub fn pause(&self, caller: Address) -> LedgerResult<()> {
        self.set_paused(caller, true)
    }

    pub fn unpause(&self, caller: Address) -> LedgerResult<()> {
        self.set_paused(caller, false)
    }

    pub fn is_paused(&self) -> LedgerResult<bool> {
        storage::load_paused(&self.instance)
    }

    pub fn get_record(&self, asset_id: AssetId) -> LedgerResult<SupplyChainRecord> {
        storage::load_record(&self.instance, asset_id)?.ok_or(LedgerError::NotFound(asset_id))
    }

    pub fn state_of(&self, asset_id: AssetId) -> LedgerResult<SupplyState> {
        Ok(self.get_record(asset_id)?.state())
    }

    /// Every asset bound to `producer`, in the order they were bound. Use
    /// [`SupplyChainLedger::items_page`] to read a long index in pieces.
    pub fn items_by_producer(&self, producer: Address) -> LedgerResult<Vec<AssetId>> {
        self.all_items(Role::Producer, producer)
    }
    pub fn items_by_distributor(&self, distributor: Address) -> LedgerResult<Vec<AssetId>> {
        self.all_items(Role::Distributor, distributor)
    }
    pub fn items_by_retailer(&self, retailer: Address) -> LedgerResult<Vec<AssetId>> {
        self.all_items(Role::Retailer, retailer)
    }
    pub fn items_by_consumer(&self, consumer: Address) -> LedgerResult<Vec<AssetId>> {
        self.all_items(Role::Consumer, consumer)
    }

    /// A page of one role index, oldest binding first. Only the requested
    /// window is read from storage.
    pub fn items_page(
        &self,
        role: Role,
        address: Address,
        offset: u64,
        limit: usize,
    ) -> LedgerResult<Vec<AssetId>> {
        self.check_page(limit)?;
        storage::load_index(&self.instance, role, address, offset, limit)
    }

    pub fn items_count(&self, role: Role, address: Address) -> LedgerResult<u64> {
        storage::index_len(&self.instance, role, address)
    }

    /// A page of the provenance history, oldest first. An offset past the end
    /// yields an empty page.
    pub fn provenance(
        &self,
        asset_id: AssetId,
        offset: usize,
        limit: usize,
    ) -> LedgerResult<Vec<ProvenanceEntry>> {
        self.check_page(limit)?;
        let record = self.get_record(asset_id)?;

        Ok(record
            .provenance()
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn all_items(&self, role: Role, address: Address) -> LedgerResult<Vec<AssetId>> {
        storage::load_index(&self.instance, role, address, 0, usize::MAX)
    }

    fn transition(&self, step: Step<'_>) -> LedgerResult<SupplyChainRecord> {
        match self.apply(&step) {
            Ok((record, digest)) => {
                info!(
                    asset_id = %step.asset_id,
                    caller = %step.caller,
                    state = ?record.state(),
                    digest = %digest,
                    "supply chain transition committed"
                );
                self.events.emit(&LedgerEvent::transition(
                    step.action,
                    step.asset_id,
                    step.caller,
                    step.counterpart,
                    step.location,
                    digest,
                ));
                Ok(record)
            }
            Err(e) => {
                debug!(
                    asset_id = %step.asset_id,
                    caller = %step.caller,
                    operation = ?step.action,
                    error = %e,
                    "supply chain transition rejected"
                );
                Err(e)
            }
        }
    }

    fn apply(&self, step: &Step<'_>) -> LedgerResult<(SupplyChainRecord, String)> {
        Ok(self
            .instance
            .transaction(|tx| self.stage(&TxStore::new(tx), step))?)
    }

    // Checks run in a fixed order: pause, capability, custody, record state,
    // role binding, then argument limits. Nothing is written unless all pass.
    fn stage(&self, store: &TxStore<'_>, step: &Step<'_>) -> TxResult<(SupplyChainRecord, String)> {
        if store.is_paused()? {
            return Err(abort(LedgerError::Paused));
        }
        self.require_capability(step.caller, step.action.capability())
            .map_err(abort)?;
        self.require_custody(step.caller, step.asset_id)
            .map_err(abort)?;

        let existing = store.record(step.asset_id)?;
        let current = match (step.action.precondition(), existing) {
            (None, Some(_)) => return Err(abort(LedgerError::AlreadyRecorded(step.asset_id))),
            (None, None) => None,
            (Some(_), None) => return Err(abort(LedgerError::NotFound(step.asset_id))),
            (Some(expected), Some(record)) if record.state() != expected => {
                return Err(abort(LedgerError::WrongState {
                    asset_id: step.asset_id,
                    expected,
                    actual: record.state(),
                }));
            }
            (Some(_), Some(record)) => Some(record),
        };

        let bound = self.resolve_binding(step, current.as_ref()).map_err(abort)?;
        self.check_text("note", step.note).map_err(abort)?;
        if let Some(location) = step.location {
            self.check_text("location", location).map_err(abort)?;
        }

        let timestamp = self.next_timestamp(current.as_ref());
        let record = match current {
            None => SupplyChainRecord::harvested(
                step.asset_id,
                step.caller,
                timestamp,
                step.location.unwrap_or_default().to_owned(),
                step.note.to_owned(),
            ),
            Some(mut record) => {
                record.advance(
                    step.action,
                    timestamp,
                    step.location.map(str::to_owned),
                    step.note.to_owned(),
                    bound,
                );
                record
            }
        };

        let (digest, cbor) = record.build().map_err(abort)?;
        store.put_record(step.asset_id, cbor)?;
        if let (Some(role), Some(address)) = (step.action.binds(), bound) {
            store.append_index(role, address, step.asset_id)?;
        }

        Ok((record, digest))
    }

    /// Address newly bound by this step, after checking any counterpart and
    /// the distributor assignment made at sale time.
    fn resolve_binding(
        &self,
        step: &Step<'_>,
        current: Option<&SupplyChainRecord>,
    ) -> LedgerResult<Option<Address>> {
        match step.action {
            Action::Sell => {
                let distributor = step.counterpart.unwrap_or_default();
                if distributor.is_zero() {
                    return Err(LedgerError::ZeroAddress(Role::Distributor));
                }
                if !self
                    .directory
                    .has_capability(Capability::Distributor, distributor)
                {
                    return Err(LedgerError::MissingCapability {
                        address: distributor,
                        role: Role::Distributor,
                        capability: Capability::Distributor,
                    });
                }
                Ok(Some(distributor))
            }
            Action::Ship => {
                let bound = current
                    .and_then(SupplyChainRecord::distributor)
                    .unwrap_or_default();
                if bound != step.caller {
                    return Err(LedgerError::NotBoundDistributor {
                        asset_id: step.asset_id,
                        caller: step.caller,
                        bound,
                    });
                }
                Ok(None)
            }
            action => Ok(action.binds().map(|_| step.caller)),
        }
    }

    fn set_paused(&self, caller: Address, paused: bool) -> LedgerResult<()> {
        self.require_capability(caller, Capability::Admin)
            .inspect_err(|e| debug!(caller = %caller, error = %e, "pause change rejected"))?;

        self.instance
            .transaction(|tx| -> TxResult<()> {
                let store = TxStore::new(tx);
                match (store.is_paused()?, paused) {
                    (true, true) => Err(abort(LedgerError::AlreadyPaused)),
                    (false, false) => Err(abort(LedgerError::NotPaused)),
                    _ => store.set_paused(paused),
                }
            })
            .map_err(LedgerError::from)
            .inspect_err(|e| debug!(caller = %caller, error = %e, "pause change rejected"))?;

        warn!(caller = %caller, paused, "ledger pause state changed");
        let event = if paused {
            LedgerEvent::Paused { by: caller }
        } else {
            LedgerEvent::Unpaused { by: caller }
        };
        self.events.emit(&event);

        Ok(())
    }

    fn require_capability(&self, caller: Address, capability: Capability) -> LedgerResult<()> {
        if self.directory.has_capability(capability, caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller, capability })
        }
    }

    fn require_custody(&self, caller: Address, asset_id: AssetId) -> LedgerResult<()> {
        match self.registry.custodian_of(asset_id) {
            Ok(custodian) if custodian == caller => Ok(()),
            Err(RegistryError::UnknownAsset(_)) => Err(LedgerError::UnknownAsset(asset_id)),
            _ => Err(LedgerError::NotCustodian { asset_id, caller }),
        }
    }

    fn check_page(&self, limit: usize) -> LedgerResult<()> {
        let max = self.config.max_page_size();
        if limit == 0 || limit > max {
            return Err(LedgerError::InvalidPage { limit, max });
        }
        Ok(())
    }

    fn check_text(&self, field: &'static str, text: &str) -> LedgerResult<()> {
        let max = self.config.max_text_len();
        if text.len() > max {
            return Err(LedgerError::TextTooLong {
                field,
                len: text.len(),
                max,
            });
        }
        Ok(())
    }

    // the log never runs backwards even if the host clock does
    fn next_timestamp(&self, current: Option<&SupplyChainRecord>) -> TimeStamp<Utc> {
        let now = self.clock.now();
        match current.and_then(SupplyChainRecord::last_timestamp) {
            Some(last) => now.max(last.clone()),
            None => now,
        }
    }
}
