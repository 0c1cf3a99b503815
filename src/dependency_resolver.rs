use alloc::vec::Vec;

use super::errors::ResolveErrorKind;
use crate::{key::ServiceKey, scope::Scope};

/// A constructor argument that is resolved from a scope before the factory is called
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error>;

    /// Pushes the keys this resolver requests, used to find transient cycles at registration.
    /// Resolvers that request nothing known upfront push nothing.
    #[inline]
    fn keys(_keys: &mut Vec<ServiceKey>) {}
}

/// The requesting scope itself, for factories that resolve services on demand.
///
/// # Warning
/// Services resolved through it are invisible to the cycle check of transient registrations.
impl DependencyResolver for Scope {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
        Ok(scope.clone())
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(scope).map_err(Into::into)?,)*))
            }

            #[inline]
            #[allow(unused_variables)]
            fn keys(keys: &mut Vec<ServiceKey>) {
                $( $ty::keys(keys); )*
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{format, string::{String, ToString}, sync::Arc, vec, vec::Vec};
    use tracing_test::traced_test;

    use super::DependencyResolver;
    use crate::{
        inject::{Inject, InjectGeneric},
        key::{GenericContract, GenericShape, ServiceKey},
        registry::Registry,
        scope::Scope,
    };

    struct Request(u8);

    trait Repo<T>: Send + Sync {}

    impl<T: Send + Sync + 'static> GenericContract for dyn Repo<T> {
        const SHAPE: GenericShape = GenericShape::new("Repo", 1);
        type Arguments = (T,);
    }

    #[test]
    fn test_tuple_keys_in_order() {
        let mut keys = Vec::new();
        <(Inject<Request>, Scope, InjectGeneric<dyn Repo<u8>>)>::keys(&mut keys);

        assert_eq!(keys, vec![ServiceKey::of::<Request>(), <dyn Repo<u8>>::key()]);
    }

    #[test]
    #[traced_test]
    fn test_tuple_resolve() {
        let registry = Registry::new();
        registry.register_singleton(Arc::new(Request(1))).unwrap();
        let scope = registry.scope();

        let (Inject(request), resolved_scope) = <(Inject<Request>, Scope)>::resolve(&scope).unwrap();
        assert_eq!(request.0, 1);
        assert!(resolved_scope.same_scope(&scope));

        assert!(<(Inject<Request>, Inject<u8>)>::resolve(&scope).is_err());
    }
}
