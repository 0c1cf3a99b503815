use alloc::{sync::Arc, vec::Vec};

use crate::{
    dependency_resolver::DependencyResolver,
    key::{GenericContract, ServiceKey},
    scope::Scope,
    ResolveErrorKind,
};

/// Constructor argument resolved as the contract `C`
pub struct Inject<C: ?Sized>(pub Arc<C>);

impl<C: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<C> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
        scope.resolve::<C>().map(Self)
    }

    #[inline]
    fn keys(keys: &mut Vec<ServiceKey>) {
        keys.push(ServiceKey::of::<C>());
    }
}

/// Constructor argument resolved as the closed generic contract `C`
pub struct InjectGeneric<C: ?Sized>(pub Arc<C>);

impl<C: GenericContract + ?Sized> DependencyResolver for InjectGeneric<C> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
        scope.resolve_generic::<C>().map(Self)
    }

    #[inline]
    fn keys(keys: &mut Vec<ServiceKey>) {
        keys.push(C::key());
    }
}
