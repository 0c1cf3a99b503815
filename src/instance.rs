use alloc::sync::Arc;
use core::{
    any::Any,
    fmt::{self, Debug, Formatter},
};

use crate::any::TypeInfo;

/// Converts a shared implementation into a shared contract.
///
/// Every type is its own contract. For `dyn Trait` contracts use [`crate::upcast!`]
/// or write the one-line impl by hand (generic implementations need the latter).
pub trait Upcast<C: ?Sized> {
    fn upcast(self: Arc<Self>) -> Arc<C>;
}

impl<T: ?Sized> Upcast<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// A type-erased, shared service value.
///
/// Holds an `Arc<C>` for the contract `C` it was created for, so `dyn Trait` contracts survive the erasure.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl Instance {
    #[inline]
    #[must_use]
    pub fn new<C>(value: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            type_info: TypeInfo::of::<C>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn downcast<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.value.downcast_ref::<Arc<C>>().cloned()
    }

    /// Info of the contract type the instance was created for
    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type", &self.type_info.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{Instance, Upcast};
    use crate::any::TypeInfo;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    upcast!(English => dyn Greeter);

    #[test]
    fn test_downcast_keeps_identity() {
        let value = Arc::new(5u32);
        let instance = Instance::new(value.clone());

        let downcasted = instance.downcast::<u32>().unwrap();
        assert!(Arc::ptr_eq(&value, &downcasted));
        assert!(instance.downcast::<u64>().is_none());
        assert_eq!(instance.type_info(), TypeInfo::of::<u32>());
    }

    #[test]
    fn test_trait_object_contract() {
        let english = Arc::new(English);
        let instance = Instance::new(Upcast::<dyn Greeter>::upcast(english));

        let greeter = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
        assert_eq!(instance.type_info(), TypeInfo::of::<dyn Greeter>());
    }
}
