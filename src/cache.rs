use alloc::{collections::BTreeMap, vec::Vec};

use crate::{dispose::Owned, instance::Instance, key::ServiceKey};

/// State of one scope
#[derive(Default)]
pub(crate) struct Cache {
    map: BTreeMap<ServiceKey, Instance>,
    owned: Vec<Owned>,
    disposed: bool,
}

/// What a scope held when it was closed
pub(crate) struct Closed {
    pub(crate) map: BTreeMap<ServiceKey, Instance>,
    pub(crate) owned: Vec<Owned>,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: &ServiceKey) -> Option<Instance> {
        self.map.get(key).cloned()
    }

    #[inline]
    pub(crate) fn insert(&mut self, key: ServiceKey, instance: Instance) {
        self.map.insert(key, instance);
    }

    #[inline]
    pub(crate) fn remove(&mut self, key: &ServiceKey) -> Option<Instance> {
        self.map.remove(key)
    }

    /// Hands the owned instance back if the scope is already closed
    #[inline]
    pub(crate) fn push_owned(&mut self, owned: Owned) -> Option<Owned> {
        if self.disposed {
            return Some(owned);
        }
        self.owned.push(owned);
        None
    }

    #[inline]
    #[must_use]
    pub(crate) const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Takes everything the scope holds, only the first call gets anything
    #[must_use]
    pub(crate) fn close(&mut self) -> Option<Closed> {
        if self.disposed {
            return None;
        }
        self.disposed = true;

        Some(Closed {
            map: core::mem::take(&mut self.map),
            owned: core::mem::take(&mut self.owned),
        })
    }
}
