//! Property-based tests for the supply chain state machine
//!
//! Random sequences of transitions are thrown at a real sled-backed ledger.
//! Custody is always handed to the acting party first, so the only thing that
//! decides success is the record's current stage. That isolates the ordering
//! rules from the authorization rules covered in the scenario tests.

use produce_ledger::{
    Action, Address, AssetId, Capability, ErrorKind, LedgerResult, Role, SupplyChainLedger,
    SupplyChainRecord, SupplyState,
    directory::InMemoryDirectory,
    registry::{AssetRegistry, InMemoryRegistry},
};
use proptest::prelude::*;
use std::sync::Arc;

struct Harness {
    ledger: SupplyChainLedger,
    registry: Arc<InMemoryRegistry>,
    admin: Address,
    producer: Address,
    distributor: Address,
    retailer: Address,
    consumer: Address,
}

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

fn harness() -> Harness {
    let admin = addr(1);
    let (producer, distributor, retailer, consumer) = (addr(2), addr(3), addr(4), addr(5));
    let directory = Arc::new(InMemoryDirectory::new(admin));
    directory.grant(admin, Capability::Producer, producer).unwrap();
    directory.grant(admin, Capability::Distributor, distributor).unwrap();
    directory.grant(admin, Capability::Retailer, retailer).unwrap();
    directory.grant(admin, Capability::Consumer, consumer).unwrap();

    let registry = Arc::new(InMemoryRegistry::new());
    let db = Arc::new(sled::Config::new().temporary(true).open().unwrap());
    let ledger = SupplyChainLedger::new(db, directory, registry.clone());

    Harness {
        ledger,
        registry,
        admin,
        producer,
        distributor,
        retailer,
        consumer,
    }
}

impl Harness {
    fn actor(&self, action: Action) -> Address {
        match action.capability() {
            Capability::Distributor => self.distributor,
            Capability::Retailer => self.retailer,
            Capability::Consumer => self.consumer,
            _ => self.producer,
        }
    }

    fn party(&self, role: Role) -> Address {
        match role {
            Role::Producer => self.producer,
            Role::Distributor => self.distributor,
            Role::Retailer => self.retailer,
            Role::Consumer => self.consumer,
        }
    }

    fn items(&self, role: Role, party: Address) -> Vec<AssetId> {
        let l = &self.ledger;
        match role {
            Role::Producer => l.items_by_producer(party),
            Role::Distributor => l.items_by_distributor(party),
            Role::Retailer => l.items_by_retailer(party),
            Role::Consumer => l.items_by_consumer(party),
        }
        .unwrap()
    }

    // hands custody to the acting party, then performs the action
    fn run(&self, action: Action, id: AssetId) -> LedgerResult<SupplyChainRecord> {
        let actor = self.actor(action);
        let custodian = self.registry.custodian_of(id).unwrap();
        if custodian != actor {
            self.registry.transfer(custodian, actor, id).unwrap();
        }

        let l = &self.ledger;
        match action {
            Action::Harvest => l.harvest(actor, id, "Farm", "harvest"),
            Action::Process => l.process(actor, id, "Mill", "process"),
            Action::Package => l.package(actor, id, "Packhouse", "package"),
            Action::ListForSale => l.list_for_sale(actor, id, "list"),
            Action::Sell => l.sell(actor, id, self.distributor, "sell"),
            Action::Ship => l.ship(actor, id, "Depot", "ship"),
            Action::Receive => l.receive(actor, id, "Store", "receive"),
            Action::Purchase => l.purchase(actor, id, "purchase"),
        }
    }
}

/// Strategy to generate any of the eight transitions
fn action_strategy() -> impl Strategy<Value = Action> {
    (0usize..8).prop_map(|i| Action::ALL[i])
}

fn action_sequence_strategy() -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(action_strategy(), 1..=24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: the states reached by successful calls are a prefix of the
    /// fixed order, with no repeats, skips or regressions
    #[test]
    fn prop_successful_states_follow_the_order(actions in action_sequence_strategy()) {
        let h = harness();
        let id = h.registry.mint(h.producer).unwrap();

        let mut reached: Vec<SupplyState> = Vec::new();
        for action in actions {
            match h.run(action, id) {
                Ok(record) => {
                    prop_assert_eq!(record.state(), action.target());
                    reached.push(record.state());
                }
                Err(e) => prop_assert_eq!(e.kind(), ErrorKind::State),
            }
        }

        prop_assert_eq!(&reached[..], &SupplyState::ORDER[..reached.len()]);
    }

    /// Property: after N successful transitions the log holds N timestamps and
    /// N notes, and one location per location-bearing transition
    #[test]
    fn prop_log_lengths_match_transitions(steps in 1usize..=8) {
        let h = harness();
        let id = h.registry.mint(h.producer).unwrap();

        let mut record = None;
        for action in &Action::ALL[..steps] {
            record = Some(h.run(*action, id).unwrap());
        }
        let record = record.unwrap();
        let located = Action::ALL[..steps].iter().filter(|a| a.carries_location()).count();

        prop_assert_eq!(record.timestamps().len(), steps);
        prop_assert_eq!(record.notes().len(), steps);
        prop_assert_eq!(record.locations().len(), located);
        prop_assert!(record.timestamps().windows(2).all(|w| w[0] <= w[1]));
    }

    /// Property: while paused every transition fails with a pause error, and
    /// the record is left exactly as it was
    #[test]
    fn prop_pause_gates_every_transition(steps in 1usize..=7, attempt in action_strategy()) {
        let h = harness();
        let id = h.registry.mint(h.producer).unwrap();
        for action in &Action::ALL[..steps] {
            h.run(*action, id).unwrap();
        }
        let before = h.ledger.get_record(id).unwrap();

        h.ledger.pause(h.admin).unwrap();
        let err = h.run(attempt, id).unwrap_err();

        prop_assert_eq!(err.kind(), ErrorKind::Paused);
        prop_assert_eq!(h.ledger.get_record(id).unwrap(), before);
    }

    /// Property: each role index names an asset exactly once, and only once the
    /// asset has reached the stage that binds that role. The paged read agrees
    /// with the full one.
    #[test]
    fn prop_indexes_are_complete(batches in prop::collection::vec(0usize..=8, 1..=4)) {
        let h = harness();

        let mut ids = Vec::new();
        for steps in &batches {
            let id = h.registry.mint(h.producer).unwrap();
            for action in &Action::ALL[..*steps] {
                h.run(*action, id).unwrap();
            }
            ids.push((id, *steps));
        }

        for role in Role::ALL {
            let party = h.party(role);
            let items = h.items(role, party);
            let len = h.ledger.items_count(role, party).unwrap();
            prop_assert_eq!(items.len() as u64, len);
            if len > 0 {
                prop_assert_eq!(&h.ledger.items_page(role, party, 0, 100).unwrap(), &items);
            }

            for (id, steps) in &ids {
                let bound = match h.ledger.get_record(*id) {
                    Ok(record) => record.role(role) == Some(party),
                    Err(_) => false,
                };
                let reached = *steps > Action::ALL.iter().position(|a| a.binds() == Some(role)).unwrap();
                prop_assert_eq!(bound, reached);

                let count = items.iter().filter(|i| *i == id).count();
                prop_assert_eq!(count, usize::from(reached));
            }
        }
    }
}
