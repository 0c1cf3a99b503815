use alloc::{boxed::Box, sync::Arc};
use tracing::debug;

use super::{
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    service::{service_fn, BoxCloneService},
};
use crate::{
    dispose::Owned,
    injection::{Injectable, PlanCache},
    instance::{Instance, Upcast},
    scope::Scope,
};

/// A factory of an implementation.
///
/// Implemented for closures whose arguments are [`DependencyResolver`]s, e.g.
/// `|Inject(config): Inject<Config>| Ok(Service::new(config))`.
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// A freshly constructed instance that isn't initialized yet
pub(crate) struct Activation {
    pub(crate) instance: Instance,
    pub(crate) owned: Option<Owned>,
    /// Runs the injection plan of the instance
    pub(crate) initialize: Box<dyn FnOnce(&Scope) -> Result<(), ResolveErrorKind> + Send>,
}

impl Activation {
    pub(crate) fn new<C, I>(value: I, plans: &PlanCache) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<C>,
    {
        let value = Arc::new(value);
        let plan = plans.plan_for::<I>();
        let target = value.clone();

        Self {
            owned: Owned::of(value.clone()),
            instance: Instance::new(<I as Upcast<C>>::upcast(value)),
            initialize: Box::new(move |scope: &Scope| plan.apply(&target, scope)),
        }
    }
}

pub(crate) type BoxedCloneInstantiator =
    BoxCloneService<Scope, Activation, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

#[must_use]
pub(crate) fn boxed_instantiator<C, I, Inst, Deps>(instantiator: Inst) -> BoxedCloneInstantiator
where
    C: ?Sized + Send + Sync + 'static,
    I: Injectable + Upcast<C>,
    Inst: Instantiator<Deps, Provides = I> + Send + Sync,
    Deps: DependencyResolver,
{
    BoxCloneService::new(service_fn({
        move |scope: Scope| {
            let dependencies = match Deps::resolve(&scope) {
                Ok(dependencies) => dependencies,
                Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
            };
            let value = match instantiator.clone().instantiate(dependencies) {
                Ok(value) => value,
                Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
            };

            debug!("Instantiated");

            Ok(Activation::new::<C, I>(value, scope.registry().plans()))
        }
    }))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{format, string::{String, ToString}, sync::Arc};
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing_test::traced_test;

    use super::{boxed_instantiator, Instantiator};
    use crate::{
        errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
        inject::Inject,
        injection::Injectable,
        registry::Registry,
        service::Service as _,
    };

    struct Config(u8);

    impl Injectable for Config {}

    struct Client(Arc<Config>);

    impl Injectable for Client {}

    #[test]
    fn test_closure_instantiator() {
        let calls = Arc::new(AtomicU8::new(0));
        let mut instantiator = {
            let calls = calls.clone();
            move |Inject(config): Inject<Config>| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InstantiateErrorKind>(Client(config))
            }
        };

        let client = instantiator.instantiate((Inject(Arc::new(Config(3))),)).unwrap();
        assert_eq!(client.0 .0, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator() {
        let registry = Registry::new();
        registry.register_singleton(Arc::new(Config(5))).unwrap();
        let scope = registry.scope();

        let mut instantiator = boxed_instantiator::<Client, Client, _, _>(|Inject(config): Inject<Config>| {
            Ok::<_, InstantiateErrorKind>(Client(config))
        });
        let activation = instantiator.call(scope.clone()).unwrap();
        assert_eq!(activation.instance.downcast::<Client>().unwrap().0 .0, 5);
        assert!(activation.owned.is_none());
        assert!(logs_contain("Instantiated"));

        let mut failing = boxed_instantiator::<Client, Client, _, _>(|| {
            Err::<Client, _>(InstantiateErrorKind::Custom(anyhow::anyhow!("no config")))
        });
        assert!(matches!(failing.call(scope.clone()), Err(InstantiatorErrorKind::Factory(_))));

        let mut missing = boxed_instantiator::<Config, Config, _, _>(|Inject(client): Inject<Client>| {
            Ok::<_, InstantiateErrorKind>(Config(client.0 .0))
        });
        assert!(matches!(
            missing.call(scope),
            Err(InstantiatorErrorKind::Deps(ResolveErrorKind::UnregisteredService { .. }))
        ));
    }
}
