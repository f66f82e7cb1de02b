//! Key layout and cbor codec for the persisted ledger tables
//!
//! Everything lives in one sled tree:
//!
//! | key                                     | value                      |
//! |-----------------------------------------|----------------------------|
//! | `record/<asset id, big endian>`         | cbor [`SupplyChainRecord`] |
//! | `index/<role tag>/<address>`            | entry count, big endian    |
//! | `index/<role tag>/<address>/<seq, BE>`  | asset id, big endian       |
//! | `meta/paused`                           | present while paused       |
//!
//! Addresses are fixed width, so an index's entries sort by sequence number
//! and never mix with another index's keys.
use super::error::{LedgerError, LedgerResult};
use super::state::SupplyChainRecord;
use super::types::{Address, AssetId, Role};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};

const RECORD_PREFIX: &[u8] = b"record/";
const INDEX_PREFIX: &[u8] = b"index/";
const PAUSED_KEY: &[u8] = b"meta/paused";

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, LedgerError>;

pub(crate) fn record_key(asset_id: AssetId) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(&asset_id.to_be_bytes());
    key
}

// holds the entry count of one index
pub(crate) fn index_key(role: Role, address: Address) -> Vec<u8> {
    let mut key = INDEX_PREFIX.to_vec();
    key.push(role.tag());
    key.push(b'/');
    key.extend_from_slice(address.as_bytes());
    key
}

pub(crate) fn index_entry_key(role: Role, address: Address, seq: u64) -> Vec<u8> {
    let mut key = index_key(role, address);
    key.push(b'/');
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Wraps a domain error so it aborts the surrounding transaction.
pub(crate) fn abort(error: impl Into<LedgerError>) -> ConflictableTransactionError<LedgerError> {
    ConflictableTransactionError::Abort(error.into())
}

fn decode_u64(bytes: &[u8]) -> LedgerResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| minicbor::decode::Error::message("index value must be 8 bytes"))?;
    Ok(u64::from_be_bytes(raw))
}

fn decode_record(bytes: &[u8]) -> LedgerResult<SupplyChainRecord> {
    Ok(minicbor::decode(bytes)?)
}

/// Read-only access outside a transaction, used by queries.
pub(crate) fn load_record(
    db: &sled::Db,
    asset_id: AssetId,
) -> LedgerResult<Option<SupplyChainRecord>> {
    db.get(record_key(asset_id))?
        .map(|bytes| decode_record(&bytes))
        .transpose()
}

/// Reads at most `limit` entries of one index, starting at position `offset`.
pub(crate) fn load_index(
    db: &sled::Db,
    role: Role,
    address: Address,
    offset: u64,
    limit: usize,
) -> LedgerResult<Vec<AssetId>> {
    let start = index_entry_key(role, address, offset);
    let end = index_entry_key(role, address, u64::MAX);

    db.range(start..=end)
        .take(limit)
        .map(|entry| -> LedgerResult<AssetId> {
            let (_, value) = entry?;
            Ok(AssetId(decode_u64(&value)?))
        })
        .collect()
}

pub(crate) fn index_len(db: &sled::Db, role: Role, address: Address) -> LedgerResult<u64> {
    db.get(index_key(role, address))?
        .map_or(Ok(0), |bytes| decode_u64(&bytes))
}

pub(crate) fn load_paused(db: &sled::Db) -> LedgerResult<bool> {
    Ok(db.contains_key(PAUSED_KEY)?)
}

/// Typed view over one sled transaction.
pub(crate) struct TxStore<'a> {
    tx: &'a TransactionalTree,
}

impl<'a> TxStore<'a> {
    pub(crate) fn new(tx: &'a TransactionalTree) -> Self {
        Self { tx }
    }

    pub(crate) fn is_paused(&self) -> TxResult<bool> {
        Ok(self.tx.get(PAUSED_KEY)?.is_some())
    }

    pub(crate) fn set_paused(&self, paused: bool) -> TxResult<()> {
        if paused {
            self.tx.insert(PAUSED_KEY, vec![1u8])?;
        } else {
            self.tx.remove(PAUSED_KEY)?;
        }
        Ok(())
    }

    pub(crate) fn record(&self, asset_id: AssetId) -> TxResult<Option<SupplyChainRecord>> {
        match self.tx.get(record_key(asset_id))? {
            Some(bytes) => decode_record(&bytes).map(Some).map_err(abort),
            None => Ok(None),
        }
    }

    /// Stores an already encoded record.
    pub(crate) fn put_record(&self, asset_id: AssetId, cbor: Vec<u8>) -> TxResult<()> {
        self.tx.insert(record_key(asset_id), cbor)?;
        Ok(())
    }

    /// Adds one entry at the end of an index. Earlier entries are not read.
    pub(crate) fn append_index(&self, role: Role, address: Address, asset_id: AssetId) -> TxResult<()> {
        let count_key = index_key(role, address);
        let seq = match self.tx.get(&count_key)? {
            Some(bytes) => decode_u64(&bytes).map_err(abort)?,
            None => 0,
        };
        self.tx.insert(
            index_entry_key(role, address, seq),
            asset_id.to_be_bytes().to_vec(),
        )?;
        self.tx.insert(count_key, (seq + 1).to_be_bytes().to_vec())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_do_not_collide_across_roles() {
        let addr = Address::from_bytes([3; 20]);
        let producer = index_key(Role::Producer, addr);
        let distributor = index_key(Role::Distributor, addr);

        assert_ne!(producer, distributor);
        assert!(producer.starts_with(INDEX_PREFIX));
        assert!(index_entry_key(Role::Producer, addr, 0).starts_with(&producer));
        assert!(index_entry_key(Role::Producer, addr, 1) < index_entry_key(Role::Producer, addr, 256));
        assert_eq!(record_key(AssetId(1)), b"record/\0\0\0\0\0\0\0\x01".to_vec());
    }

    #[test]
    fn index_appends_in_order() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let addr = Address::from_bytes([5; 20]);

        for id in [4u64, 2, 9] {
            db.transaction(|tx| TxStore::new(tx).append_index(Role::Retailer, addr, AssetId(id)))
                .unwrap();
        }

        assert_eq!(
            load_index(&db, Role::Retailer, addr, 0, 10).unwrap(),
            vec![AssetId(4), AssetId(2), AssetId(9)]
        );
        assert_eq!(index_len(&db, Role::Retailer, addr).unwrap(), 3);
        assert!(load_index(&db, Role::Consumer, addr, 0, 10).unwrap().is_empty());
        assert_eq!(index_len(&db, Role::Consumer, addr).unwrap(), 0);
    }

    #[test]
    fn index_reads_are_bounded_windows() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let addr = Address::from_bytes([6; 20]);
        let other = Address::from_bytes([7; 20]);

        for id in 1..=300u64 {
            db.transaction(|tx| TxStore::new(tx).append_index(Role::Producer, addr, AssetId(id)))
                .unwrap();
        }
        db.transaction(|tx| TxStore::new(tx).append_index(Role::Producer, other, AssetId(999)))
            .unwrap();

        let page = load_index(&db, Role::Producer, addr, 255, 3).unwrap();
        assert_eq!(page, vec![AssetId(256), AssetId(257), AssetId(258)]);

        let tail = load_index(&db, Role::Producer, addr, 298, 10).unwrap();
        assert_eq!(tail, vec![AssetId(299), AssetId(300)]);
        assert!(load_index(&db, Role::Producer, addr, 300, 10).unwrap().is_empty());
        assert_eq!(index_len(&db, Role::Producer, addr).unwrap(), 300);
    }
}
