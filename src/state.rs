//! Supply chain stages, the transition table and the per-asset record
use super::error::LedgerResult;
use super::types::{Address, AssetId, Capability, Role, TimeStamp};
use chrono::Utc;

/// Stages of a produce batch, in the only order they may be reached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum SupplyState {
    #[n(0)]
    Harvested,
    #[n(1)]
    Processed,
    #[n(2)]
    Packaged,
    #[n(3)]
    ForSale,
    #[n(4)]
    Sold,
    #[n(5)]
    Shipped,
    #[n(6)]
    Received,
    #[n(7)]
    Purchased,
}

impl SupplyState {
    pub const ORDER: [SupplyState; 8] = [
        SupplyState::Harvested,
        SupplyState::Processed,
        SupplyState::Packaged,
        SupplyState::ForSale,
        SupplyState::Sold,
        SupplyState::Shipped,
        SupplyState::Received,
        SupplyState::Purchased,
    ];

    /// Position in [`SupplyState::ORDER`].
    pub fn position(self) -> usize {
        self as usize
    }
    pub fn next(self) -> Option<SupplyState> {
        Self::ORDER.get(self.position() + 1).copied()
    }
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// One entry point of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Harvest,
    Process,
    Package,
    ListForSale,
    Sell,
    Ship,
    Receive,
    Purchase,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Harvest,
        Action::Process,
        Action::Package,
        Action::ListForSale,
        Action::Sell,
        Action::Ship,
        Action::Receive,
        Action::Purchase,
    ];

    /// Capability the caller must hold.
    pub fn capability(self) -> Capability {
        match self {
            Action::Harvest
            | Action::Process
            | Action::Package
            | Action::ListForSale
            | Action::Sell => Capability::Producer,
            Action::Ship => Capability::Distributor,
            Action::Receive => Capability::Retailer,
            Action::Purchase => Capability::Consumer,
        }
    }
    /// State the record must be in, `None` when the record must not exist yet.
    pub fn precondition(self) -> Option<SupplyState> {
        match self {
            Action::Harvest => None,
            Action::Process => Some(SupplyState::Harvested),
            Action::Package => Some(SupplyState::Processed),
            Action::ListForSale => Some(SupplyState::Packaged),
            Action::Sell => Some(SupplyState::ForSale),
            Action::Ship => Some(SupplyState::Sold),
            Action::Receive => Some(SupplyState::Shipped),
            Action::Purchase => Some(SupplyState::Received),
        }
    }
    pub fn target(self) -> SupplyState {
        match self {
            Action::Harvest => SupplyState::Harvested,
            Action::Process => SupplyState::Processed,
            Action::Package => SupplyState::Packaged,
            Action::ListForSale => SupplyState::ForSale,
            Action::Sell => SupplyState::Sold,
            Action::Ship => SupplyState::Shipped,
            Action::Receive => SupplyState::Received,
            Action::Purchase => SupplyState::Purchased,
        }
    }
    pub fn carries_location(self) -> bool {
        matches!(
            self,
            Action::Harvest | Action::Process | Action::Package | Action::Ship | Action::Receive
        )
    }
    /// Role first bound by this action, if any.
    pub fn binds(self) -> Option<Role> {
        match self {
            Action::Harvest => Some(Role::Producer),
            Action::Sell => Some(Role::Distributor),
            Action::Receive => Some(Role::Retailer),
            Action::Purchase => Some(Role::Consumer),
            _ => None,
        }
    }
    /// Action whose success puts a record into `state`.
    pub fn reaching(state: SupplyState) -> Action {
        Self::ALL[state.position()]
    }
}

/// Ledger state for one asset. Created by harvest, never removed.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct SupplyChainRecord {
    #[n(0)]
    asset_id: AssetId,
    #[n(1)]
    state: SupplyState,
    #[n(2)]
    producer: Address,
    #[n(3)]
    distributor: Option<Address>,
    #[n(4)]
    retailer: Option<Address>,
    #[n(5)]
    consumer: Option<Address>,
    #[n(6)]
    timestamps: Vec<TimeStamp<Utc>>,
    #[n(7)]
    locations: Vec<String>,
    #[n(8)]
    notes: Vec<String>,
}

/// A single provenance step joined from the record's parallel sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEntry {
    pub state: SupplyState,
    pub timestamp: TimeStamp<Utc>,
    pub location: Option<String>,
    pub note: String,
}

impl SupplyChainRecord {
    /// Record as it stands right after a successful harvest.
    pub(crate) fn harvested(
        asset_id: AssetId,
        producer: Address,
        timestamp: TimeStamp<Utc>,
        location: String,
        note: String,
    ) -> Self {
        Self {
            asset_id,
            state: SupplyState::Harvested,
            producer,
            distributor: None,
            retailer: None,
            consumer: None,
            timestamps: vec![timestamp],
            locations: vec![location],
            notes: vec![note],
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }
    pub fn state(&self) -> SupplyState {
        self.state
    }
    pub fn producer(&self) -> Address {
        self.producer
    }
    pub fn distributor(&self) -> Option<Address> {
        self.distributor
    }
    pub fn retailer(&self) -> Option<Address> {
        self.retailer
    }
    pub fn consumer(&self) -> Option<Address> {
        self.consumer
    }
    pub fn role(&self, role: Role) -> Option<Address> {
        match role {
            Role::Producer => Some(self.producer),
            Role::Distributor => self.distributor,
            Role::Retailer => self.retailer,
            Role::Consumer => self.consumer,
        }
    }
    pub fn timestamps(&self) -> &[TimeStamp<Utc>] {
        &self.timestamps
    }
    pub fn locations(&self) -> &[String] {
        &self.locations
    }
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
    pub fn last_timestamp(&self) -> Option<&TimeStamp<Utc>> {
        self.timestamps.last()
    }

    /// Moves the record one stage forward and appends to the provenance log.
    /// Callers have already checked the precondition state; a role slot that
    /// is already filled is left untouched.
    pub(crate) fn advance(
        &mut self,
        action: Action,
        timestamp: TimeStamp<Utc>,
        location: Option<String>,
        note: String,
        bound: Option<Address>,
    ) {
        self.state = action.target();
        self.timestamps.push(timestamp);
        if let Some(location) = location {
            self.locations.push(location);
        }
        self.notes.push(note);

        if let (Some(role), Some(address)) = (action.binds(), bound) {
            let slot = match role {
                Role::Producer => return,
                Role::Distributor => &mut self.distributor,
                Role::Retailer => &mut self.retailer,
                Role::Consumer => &mut self.consumer,
            };
            slot.get_or_insert(address);
        }
    }

    /// Full provenance history, one entry per completed stage.
    pub fn provenance(&self) -> Vec<ProvenanceEntry> {
        let mut locations = self.locations.iter();

        SupplyState::ORDER
            .iter()
            .zip(self.timestamps.iter().zip(self.notes.iter()))
            .map(|(state, (timestamp, note))| ProvenanceEntry {
                state: *state,
                timestamp: timestamp.clone(),
                location: Action::reaching(*state)
                    .carries_location()
                    .then(|| locations.next().cloned())
                    .flatten(),
                note: note.clone(),
            })
            .collect()
    }

    /// Returns the sha256 digest of the record together with its cbor encoding.
    pub fn build(&self) -> LedgerResult<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn states_follow_action_table() {
        for action in Action::ALL {
            let expected_next = action.precondition().and_then(SupplyState::next);
            if let Some(next) = expected_next {
                assert_eq!(next, action.target());
            }
            assert_eq!(Action::reaching(action.target()), action);
        }
        assert!(SupplyState::Purchased.is_terminal());
        assert_eq!(SupplyState::Harvested.next(), Some(SupplyState::Processed));
    }

    #[test]
    fn advance_keeps_first_bound_role() {
        let mut record = SupplyChainRecord::harvested(
            AssetId(1),
            addr(1),
            TimeStamp::new(),
            "Farm A".into(),
            "n1".into(),
        );
        record.advance(Action::Sell, TimeStamp::new(), None, "sold".into(), Some(addr(2)));
        record.advance(Action::Sell, TimeStamp::new(), None, "again".into(), Some(addr(3)));

        assert_eq!(record.distributor(), Some(addr(2)));
    }

    #[test]
    fn provenance_lines_up_locations() {
        let mut record = SupplyChainRecord::harvested(
            AssetId(9),
            addr(1),
            TimeStamp::new(),
            "Farm A".into(),
            "picked".into(),
        );
        record.advance(Action::Process, TimeStamp::new(), Some("Mill".into()), "washed".into(), None);
        record.advance(Action::Package, TimeStamp::new(), Some("Shed".into()), "boxed".into(), None);
        record.advance(Action::ListForSale, TimeStamp::new(), None, "listed".into(), None);

        let history = record.provenance();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].location.as_deref(), Some("Shed"));
        assert_eq!(history[3].location, None);
        assert_eq!(history[3].state, SupplyState::ForSale);
    }

    #[test]
    fn record_cbor_roundtrip_and_digest() {
        let record = SupplyChainRecord::harvested(
            AssetId(3),
            addr(4),
            TimeStamp::new(),
            "Farm B".into(),
            "n".into(),
        );
        let (hash, cbor) = record.build().unwrap();
        let decoded: SupplyChainRecord = minicbor::decode(&cbor).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(hash, sha256::digest(&cbor));
    }
}
