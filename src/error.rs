use super::state::SupplyState;
use super::types::{Address, AssetId, Capability, Role};

/// Broad category of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Custody,
    State,
    Validation,
    Paused,
    Storage,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("{caller} lacks the {capability} capability")]
    Unauthorized {
        caller: Address,
        capability: Capability,
    },
    #[error("{caller} is not the custodian of asset {asset_id}")]
    NotCustodian { asset_id: AssetId, caller: Address },
    #[error("asset {0} is unknown to the asset registry")]
    UnknownAsset(AssetId),
    #[error("{caller} is not the distributor assigned to asset {asset_id} ({bound})")]
    NotBoundDistributor {
        asset_id: AssetId,
        caller: Address,
        bound: Address,
    },
    #[error("asset {0} already has a supply chain record")]
    AlreadyRecorded(AssetId),
    #[error("asset {0} has no supply chain record")]
    NotFound(AssetId),
    #[error("asset {asset_id} is {actual:?}, expected {expected:?}")]
    WrongState {
        asset_id: AssetId,
        expected: SupplyState,
        actual: SupplyState,
    },
    #[error("zero address is not a valid {0}")]
    ZeroAddress(Role),
    #[error("{address} lacks the {capability} capability required of a {role}")]
    MissingCapability {
        address: Address,
        role: Role,
        capability: Capability,
    },
    #[error("{field} is {len} bytes, limit is {max}")]
    TextTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("page limit must be between 1 and {max}, got {limit}")]
    InvalidPage { limit: usize, max: usize },
    #[error("ledger is paused")]
    Paused,
    #[error("ledger is already paused")]
    AlreadyPaused,
    #[error("ledger is not paused")]
    NotPaused,
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized { .. } => ErrorKind::Authorization,
            LedgerError::NotCustodian { .. }
            | LedgerError::UnknownAsset(_)
            | LedgerError::NotBoundDistributor { .. } => ErrorKind::Custody,
            LedgerError::AlreadyRecorded(_)
            | LedgerError::NotFound(_)
            | LedgerError::WrongState { .. } => ErrorKind::State,
            LedgerError::ZeroAddress(_)
            | LedgerError::MissingCapability { .. }
            | LedgerError::TextTooLong { .. }
            | LedgerError::InvalidPage { .. } => ErrorKind::Validation,
            LedgerError::Paused | LedgerError::AlreadyPaused | LedgerError::NotPaused => {
                ErrorKind::Paused
            }
            LedgerError::Storage(_) | LedgerError::Encode(_) | LedgerError::Decode(_) => {
                ErrorKind::Storage
            }
        }
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(value: sled::transaction::TransactionError<LedgerError>) -> Self {
        match value {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => LedgerError::Storage(e),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("{0} is not an admin")]
    NotAdmin(Address),
    #[error("zero address cannot hold capabilities")]
    ZeroAddress,
    #[error("{account} already holds {capability}")]
    AlreadyGranted {
        account: Address,
        capability: Capability,
    },
    #[error("{account} does not hold {capability}")]
    NotGranted {
        account: Address,
        capability: Capability,
    },
    #[error("the last admin cannot give up the admin capability")]
    LastAdmin,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("asset {0} does not exist")]
    UnknownAsset(AssetId),
    #[error("{caller} does not own asset {asset_id}")]
    NotOwner { asset_id: AssetId, caller: Address },
    #[error("cannot mint or transfer to the zero address")]
    ZeroAddress,
}

#[derive(thiserror::Error, Debug)]
pub enum AddressError {
    #[error("invalid bech32 address: {0}")]
    Bech32(String),
    #[error("invalid hex address: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("unexpected address prefix {0}")]
    WrongHrp(String),
    #[error("address must be 20 bytes, got {0}")]
    WrongLength(usize),
}
