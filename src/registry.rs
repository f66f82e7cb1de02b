//! Custody lookups consumed by the ledger, plus an in-memory asset registry
use super::error::RegistryError;
use super::types::{Address, AssetId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Source of truth for who currently holds an asset. The ledger never
/// changes custody; it only checks it.
pub trait AssetRegistry: Send + Sync {
    fn custodian_of(&self, asset_id: AssetId) -> Result<Address, RegistryError>;
}

#[derive(Debug)]
struct Registry {
    next_id: u64,
    owners: HashMap<AssetId, Address>,
}

/// Registry kept in process memory. Ids are handed out sequentially from 1.
#[derive(Debug)]
pub struct InMemoryRegistry {
    inner: RwLock<Registry>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Registry {
                next_id: 1,
                owners: HashMap::new(),
            }),
        }
    }

    pub fn mint(&self, to: Address) -> Result<AssetId, RegistryError> {
        if to.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let asset_id = AssetId(registry.next_id);
        registry.next_id += 1;
        registry.owners.insert(asset_id, to);

        Ok(asset_id)
    }

    /// Hands the asset to `to`. Only the current custodian may transfer.
    pub fn transfer(
        &self,
        caller: Address,
        to: Address,
        asset_id: AssetId,
    ) -> Result<(), RegistryError> {
        if to.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let owner = registry
            .owners
            .get_mut(&asset_id)
            .ok_or(RegistryError::UnknownAsset(asset_id))?;
        if *owner != caller {
            return Err(RegistryError::NotOwner { asset_id, caller });
        }
        *owner = to;

        Ok(())
    }

    pub fn burn(&self, caller: Address, asset_id: AssetId) -> Result<(), RegistryError> {
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match registry.owners.get(&asset_id) {
            None => Err(RegistryError::UnknownAsset(asset_id)),
            Some(owner) if *owner != caller => Err(RegistryError::NotOwner { asset_id, caller }),
            Some(_) => {
                registry.owners.remove(&asset_id);
                Ok(())
            }
        }
    }
}

impl AssetRegistry for InMemoryRegistry {
    fn custodian_of(&self, asset_id: AssetId) -> Result<Address, RegistryError> {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .owners
            .get(&asset_id)
            .copied()
            .ok_or(RegistryError::UnknownAsset(asset_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn mint_is_sequential() {
        let registry = InMemoryRegistry::new();

        assert_eq!(registry.mint(addr(1)).unwrap(), AssetId(1));
        assert_eq!(registry.mint(addr(1)).unwrap(), AssetId(2));
        assert_eq!(registry.mint(Address::ZERO), Err(RegistryError::ZeroAddress));
    }

    #[test]
    fn transfer_requires_owner() {
        let registry = InMemoryRegistry::new();
        let id = registry.mint(addr(1)).unwrap();

        assert!(matches!(
            registry.transfer(addr(2), addr(3), id),
            Err(RegistryError::NotOwner { .. })
        ));
        registry.transfer(addr(1), addr(3), id).unwrap();
        assert_eq!(registry.custodian_of(id).unwrap(), addr(3));
    }

    #[test]
    fn burn_forgets_asset() {
        let registry = InMemoryRegistry::new();
        let id = registry.mint(addr(1)).unwrap();
        registry.burn(addr(1), id).unwrap();

        assert_eq!(
            registry.custodian_of(id),
            Err(RegistryError::UnknownAsset(id))
        );
    }
}
