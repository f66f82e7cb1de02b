//! Identifiers, capabilities and timestamps shared across the ledger
use super::error::AddressError;
use bech32::{Bech32m, Hrp};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

// human readable part used when rendering addresses
const ADDRESS_HRP: Hrp = Hrp::parse_unchecked("agri");

/// A principal on the ledger. The all-zero address is the null address and is
/// never a valid participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_LEN]);

    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
    pub fn is_zero(&self) -> bool {
        self.0 == [0; ADDRESS_LEN]
    }
    /// Parses a hex address, with or without a leading `0x`.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let raw = hex::decode(s.trim_start_matches("0x"))?;
        Self::try_from(raw.as_slice())
    }
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = AddressError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ADDRESS_LEN] = value
            .try_into()
            .map_err(|_| AddressError::WrongLength(value.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = bech32::encode::<Bech32m>(ADDRESS_HRP, &self.0).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data) = bech32::decode(s).map_err(|e| AddressError::Bech32(e.to_string()))?;
        if hrp != ADDRESS_HRP {
            return Err(AddressError::WrongHrp(hrp.to_string()));
        }
        Self::try_from(data.as_slice())
    }
}

impl<C> minicbor::Encode<C> for Address {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Address {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes: [u8; ADDRESS_LEN] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("address must be 20 bytes"))?;

        Ok(Address(bytes))
    }
}

/// Handle of one produce batch, assigned by the asset registry at mint time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
#[cbor(array)]
pub struct AssetId(#[n(0)] pub u64);

impl AssetId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for AssetId {
    fn from(value: u64) -> Self {
        AssetId(value)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named permissions answered by the capability directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Admin,
    Producer,
    Distributor,
    Retailer,
    Consumer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Admin => "admin",
            Capability::Producer => "producer",
            Capability::Distributor => "distributor",
            Capability::Retailer => "retailer",
            Capability::Consumer => "consumer",
        };
        f.write_str(name)
    }
}

/// A custody role bound on a record. Each role has its own participant index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Distributor,
    Retailer,
    Consumer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Producer, Role::Distributor, Role::Retailer, Role::Consumer];

    pub fn capability(self) -> Capability {
        match self {
            Role::Producer => Capability::Producer,
            Role::Distributor => Capability::Distributor,
            Role::Retailer => Capability::Retailer,
            Role::Consumer => Capability::Consumer,
        }
    }
    // stable tag used in index keys, never renumber
    pub(crate) fn tag(self) -> u8 {
        match self {
            Role::Producer => 0,
            Role::Distributor => 1,
            Role::Retailer => 2,
            Role::Consumer => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.capability(), f)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// chrono's Utc has no ordering of its own, so order by the instant
impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
