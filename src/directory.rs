//! Capability lookups consumed by the ledger, plus an in-memory directory
use super::error::DirectoryError;
use super::types::{Address, Capability};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Answers whether a principal holds a capability. The ledger only ever reads
/// through this trait; grants and revocations belong to the implementation.
pub trait CapabilityDirectory: Send + Sync {
    fn has_capability(&self, capability: Capability, account: Address) -> bool;
}

/// Directory kept in process memory. Grants and revocations are gated on the
/// Admin capability.
#[derive(Debug)]
pub struct InMemoryDirectory {
    grants: RwLock<HashMap<Capability, HashSet<Address>>>,
}

impl InMemoryDirectory {
    /// Bootstraps the directory with a single admin.
    pub fn new(admin: Address) -> Self {
        let mut grants: HashMap<Capability, HashSet<Address>> = HashMap::new();
        grants.entry(Capability::Admin).or_default().insert(admin);

        Self {
            grants: RwLock::new(grants),
        }
    }

    pub fn grant(
        &self,
        admin: Address,
        capability: Capability,
        account: Address,
    ) -> Result<(), DirectoryError> {
        if account.is_zero() {
            return Err(DirectoryError::ZeroAddress);
        }
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        if !holds(&grants, Capability::Admin, admin) {
            return Err(DirectoryError::NotAdmin(admin));
        }
        if !grants.entry(capability).or_default().insert(account) {
            return Err(DirectoryError::AlreadyGranted {
                account,
                capability,
            });
        }

        Ok(())
    }

    pub fn revoke(
        &self,
        admin: Address,
        capability: Capability,
        account: Address,
    ) -> Result<(), DirectoryError> {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        if !holds(&grants, Capability::Admin, admin) {
            return Err(DirectoryError::NotAdmin(admin));
        }
        let members = grants.entry(capability).or_default();
        if !members.contains(&account) {
            return Err(DirectoryError::NotGranted {
                account,
                capability,
            });
        }
        if capability == Capability::Admin && members.len() == 1 {
            return Err(DirectoryError::LastAdmin);
        }
        members.remove(&account);

        Ok(())
    }

    /// Every account currently holding `capability`, in no particular order.
    pub fn members(&self, capability: Capability) -> Vec<Address> {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants
            .get(&capability)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl CapabilityDirectory for InMemoryDirectory {
    fn has_capability(&self, capability: Capability, account: Address) -> bool {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        holds(&grants, capability, account)
    }
}

fn holds(
    grants: &HashMap<Capability, HashSet<Address>>,
    capability: Capability,
    account: Address,
) -> bool {
    grants
        .get(&capability)
        .is_some_and(|members| members.contains(&account))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn only_admins_grant() {
        let directory = InMemoryDirectory::new(addr(1));

        assert_eq!(
            directory.grant(addr(2), Capability::Producer, addr(3)),
            Err(DirectoryError::NotAdmin(addr(2)))
        );
        directory.grant(addr(1), Capability::Producer, addr(3)).unwrap();
        assert!(directory.has_capability(Capability::Producer, addr(3)));
        assert!(!directory.has_capability(Capability::Distributor, addr(3)));
    }

    #[test]
    fn revoke_and_last_admin() {
        let directory = InMemoryDirectory::new(addr(1));
        directory.grant(addr(1), Capability::Retailer, addr(4)).unwrap();
        directory.revoke(addr(1), Capability::Retailer, addr(4)).unwrap();

        assert!(!directory.has_capability(Capability::Retailer, addr(4)));
        assert_eq!(
            directory.revoke(addr(1), Capability::Admin, addr(1)),
            Err(DirectoryError::LastAdmin)
        );
    }

    #[test]
    fn duplicate_grant_rejected() {
        let directory = InMemoryDirectory::new(addr(1));
        directory.grant(addr(1), Capability::Consumer, addr(5)).unwrap();

        assert!(matches!(
            directory.grant(addr(1), Capability::Consumer, addr(5)),
            Err(DirectoryError::AlreadyGranted { .. })
        ));
        assert_eq!(directory.members(Capability::Consumer), vec![addr(5)]);
    }
}
