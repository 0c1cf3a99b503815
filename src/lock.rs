use ahash::AHasher;
use core::{
    array,
    hash::{Hash, Hasher as _},
};
use parking_lot::Mutex;

#[allow(clippy::cast_possible_truncation)]
fn stripe_index<const N: usize>(val: impl Hash) -> usize {
    let mut hasher = AHasher::default();
    val.hash(&mut hasher);

    hasher.finish() as usize % N
}

/// Fixed set of mutexes, one is picked by the hash of a value.
/// Equal values always share a stripe, so holding the stripe gives a per-value critical section.
pub(crate) struct StripedLocks<const N: usize> {
    stripes: [Mutex<()>; N],
}

impl<const N: usize> StripedLocks<N> {
    #[inline]
    #[must_use]
    fn new() -> Self {
        Self {
            stripes: array::from_fn(|_| Mutex::new(())),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, val: impl Hash) -> &Mutex<()> {
        &self.stripes[stripe_index::<N>(val)]
    }
}

impl<const N: usize> Default for StripedLocks<N> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::StripedLocks;
    use crate::key::ServiceKey;

    #[test]
    fn test_equal_values_share_stripe() {
        let locks = StripedLocks::<16>::default();

        let first = locks.get(ServiceKey::of::<u8>());
        let second = locks.get(ServiceKey::of::<u8>());
        assert!(core::ptr::eq(first, second));

        let _guard = first.lock();
        assert!(second.try_lock().is_none());
    }
}
