use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use parking_lot::RwLock;
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    config::Config,
    cycle::find_cycle,
    dependency_resolver::DependencyResolver,
    dispose::DisposeErrorHandler,
    errors::{DisposeErrors, InstantiateErrorKind, RegisterErrorKind, ResolveErrorKind, SpecializeErrorKind},
    generic::GenericImplementation,
    injection::{Injectable, InjectionPlan, PlanCache},
    instance::{Instance, Upcast},
    instantiator::{boxed_instantiator, BoxedCloneInstantiator, Instantiator},
    key::{GenericShape, ServiceKey, MAX_GENERIC_ARITY},
    lock::StripedLocks,
    scope::Scope,
};

const LOCK_STRIPES: usize = 64;

/// How long an instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One caller-supplied instance, never owned by a scope
    Singleton,
    /// One instance per scope, created on the first resolution
    Scoped,
    /// A new instance per resolution
    Transient,
}

#[derive(Clone)]
pub(crate) enum Provider {
    Singleton(Instance),
    Scoped(BoxedCloneInstantiator),
    Transient(BoxedCloneInstantiator),
}

impl Provider {
    #[inline]
    const fn lifetime(&self) -> Lifetime {
        match self {
            Self::Singleton(_) => Lifetime::Singleton,
            Self::Scoped(_) => Lifetime::Scoped,
            Self::Transient(_) => Lifetime::Transient,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) implementation: TypeInfo,
    /// Keys required to construct and initialize the implementation
    pub(crate) dependencies: Arc<[ServiceKey]>,
    pub(crate) provider: Provider,
}

/// Table from contract keys to construction rules, shared by every scope created from it.
///
/// Registration is expected to happen during setup, after that the registry is read-mostly.
/// Each key has at most one registration, registering it again is an error.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use scopedi::{Inject, Injectable, Registry};
///
/// struct Config {
///     url: &'static str,
/// }
///
/// struct Client {
///     config: Arc<Config>,
/// }
///
/// impl Injectable for Client {}
///
/// let registry = Registry::new();
/// registry.register_singleton(Arc::new(Config { url: "localhost" })).unwrap();
/// registry
///     .register_scoped::<Client, _, _, _>(|Inject(config): Inject<Config>| Ok(Client { config }))
///     .unwrap();
///
/// let scope = registry.scope();
/// let client = scope.resolve::<Client>().unwrap();
/// assert_eq!(client.config.url, "localhost");
/// assert!(Arc::ptr_eq(&client, &scope.resolve::<Client>().unwrap()));
/// ```
pub struct Registry {
    registrations: RwLock<BTreeMap<ServiceKey, Registration>>,
    open_generics: RwLock<BTreeMap<GenericShape, Arc<GenericImplementation>>>,
    plans: PlanCache,
    locks: StripedLocks<LOCK_STRIPES>,
    dispose_error_handlers: RwLock<Vec<DisposeErrorHandler>>,
    config: Config,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Arc<Self> {
        Arc::new(Self {
            registrations: RwLock::default(),
            open_generics: RwLock::default(),
            plans: PlanCache::default(),
            locks: StripedLocks::default(),
            dispose_error_handlers: RwLock::default(),
            config,
        })
    }

    /// Creates a resolution session
    #[inline]
    #[must_use]
    pub fn scope(self: &Arc<Self>) -> Scope {
        Scope::new(self.clone())
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Injection plan of `T`, built on the first request and shared afterwards
    #[inline]
    #[must_use]
    pub fn injection_plan<T: Injectable>(&self) -> InjectionPlan<T> {
        self.plans.plan_for::<T>()
    }

    #[inline]
    pub(crate) const fn plans(&self) -> &PlanCache {
        &self.plans
    }

    /// Registers `I` as the contract `C` with one instance per scope.
    ///
    /// Scoped instances are cached before their injection plan runs,
    /// so cycles through injected members resolve to the same instance.
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::AlreadyRegistered`] if `C` is already registered
    pub fn register_scoped<C, I, Inst, Deps>(&self, instantiator: Inst) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<C>,
        Inst: Instantiator<Deps, Provides = I, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver<Error = ResolveErrorKind>,
    {
        self.register_scoped_with_key::<C, I, Inst, Deps>(ServiceKey::of::<C>(), instantiator)
    }

    /// Registers `I` as the contract `C` created anew on each resolution.
    ///
    /// Transient instances are built eagerly, so a transient reachable from its own dependencies
    /// recurses without bound. Pass `check_cycles` to reject such registrations upfront.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::AlreadyRegistered`] if `C` is already registered
    /// - Returns [`RegisterErrorKind::CircularTransient`] if `check_cycles` is set and a cycle is found
    pub fn register_transient<C, I, Inst, Deps>(&self, instantiator: Inst, check_cycles: bool) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<C>,
        Inst: Instantiator<Deps, Provides = I, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver<Error = ResolveErrorKind>,
    {
        self.register_transient_with_key::<C, I, Inst, Deps>(ServiceKey::of::<C>(), instantiator, check_cycles)
    }

    /// Registers a caller-owned instance as the contract `C`.
    /// It's returned as is to every scope and never disposed by them.
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::AlreadyRegistered`] if `C` is already registered
    pub fn register_singleton<C>(&self, instance: Arc<C>) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.register_singleton_with_key(ServiceKey::of::<C>(), instance)
    }

    /// Same as [`Self::register_scoped`], but under an explicit key, e.g. a closed generic one
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::AlreadyRegistered`] if `key` is already registered
    pub fn register_scoped_with_key<C, I, Inst, Deps>(&self, key: ServiceKey, instantiator: Inst) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<C>,
        Inst: Instantiator<Deps, Provides = I, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver<Error = ResolveErrorKind>,
    {
        let registration = Registration {
            implementation: TypeInfo::of::<I>(),
            dependencies: self.dependencies::<I, Deps>(),
            provider: Provider::Scoped(boxed_instantiator::<C, I, Inst, Deps>(instantiator)),
        };
        self.register(key, registration, false)
    }

    /// Same as [`Self::register_transient`], but under an explicit key, e.g. a closed generic one
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::AlreadyRegistered`] if `key` is already registered
    /// - Returns [`RegisterErrorKind::CircularTransient`] if `check_cycles` is set and a cycle is found
    pub fn register_transient_with_key<C, I, Inst, Deps>(
        &self,
        key: ServiceKey,
        instantiator: Inst,
        check_cycles: bool,
    ) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable + Upcast<C>,
        Inst: Instantiator<Deps, Provides = I, Error = InstantiateErrorKind> + Send + Sync,
        Deps: DependencyResolver<Error = ResolveErrorKind>,
    {
        let registration = Registration {
            implementation: TypeInfo::of::<I>(),
            dependencies: self.dependencies::<I, Deps>(),
            provider: Provider::Transient(boxed_instantiator::<C, I, Inst, Deps>(instantiator)),
        };
        self.register(key, registration, check_cycles)
    }

    /// Same as [`Self::register_singleton`], but under an explicit key, e.g. a closed generic one
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::AlreadyRegistered`] if `key` is already registered
    pub fn register_singleton_with_key<C>(&self, key: ServiceKey, instance: Arc<C>) -> Result<(), RegisterErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let registration = Registration {
            implementation: TypeInfo::of::<C>(),
            dependencies: Arc::new([]),
            provider: Provider::Singleton(Instance::new(instance)),
        };
        self.register(key, registration, false)
    }

    /// Registers an open generic implementation of the contract `shape`.
    /// Closed keys of the shape are specialized on their first resolution.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::InvalidGenericRegistration`] if the shape isn't generic
    ///   or the argument map of the implementation doesn't fit it
    /// - Returns [`RegisterErrorKind::UnsupportedArity`] if the shape is wider than [`MAX_GENERIC_ARITY`]
    /// - Returns [`RegisterErrorKind::GenericAlreadyRegistered`] if the shape is already registered
    pub fn register_open_generic(
        &self,
        shape: GenericShape,
        implementation: GenericImplementation,
    ) -> Result<(), RegisterErrorKind> {
        let span = info_span!("register_open_generic", contract = %shape, implementation = implementation.name);
        let _guard = span.enter();

        if let Err(err) = implementation.validate(shape) {
            error!("{}", err);
            return Err(err);
        }

        let _stripe = self.locks.get(shape).lock();
        let mut open_generics = self.open_generics.write();
        if open_generics.contains_key(&shape) {
            let err = RegisterErrorKind::GenericAlreadyRegistered { shape };
            error!("{}", err);
            return Err(err);
        }
        open_generics.insert(shape, Arc::new(implementation));
        debug!("Registered");

        Ok(())
    }

    /// Removes the registration of `key`.
    /// Must not be called while `key` is being resolved.
    pub fn clear(&self, key: &ServiceKey) -> bool {
        let _stripe = self.locks.get(key).lock();
        let removed = self.registrations.write().remove(key).is_some();
        debug!(service = %key, removed, "Registration cleared");
        removed
    }

    /// Removes the open generic registration of `shape`.
    /// Closed keys already specialized from it stay registered.
    pub fn clear_open_generic(&self, shape: &GenericShape) -> bool {
        let _stripe = self.locks.get(shape).lock();
        let removed = self.open_generics.write().remove(shape).is_some();
        debug!(contract = %shape, removed, "Open generic registration cleared");
        removed
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.registrations.read().contains_key(key)
    }

    /// Lifetime of the registration of `key`, lookup never fails
    #[inline]
    #[must_use]
    pub fn lifetime(&self, key: &ServiceKey) -> Option<Lifetime> {
        self.registrations.read().get(key).map(|registration| registration.provider.lifetime())
    }

    /// Subscribes to disposal failures of scopes created from this registry.
    /// The handler is called once per failed disposal with every error collected during it.
    pub fn on_dispose_error(&self, handler: impl Fn(&DisposeErrors) + Send + Sync + 'static) {
        self.dispose_error_handlers.write().push(Arc::new(handler));
    }

    /// Derives and caches the registration of a closed generic `key` from the open generic registration of its shape.
    /// Does nothing if `key` is already registered.
    ///
    /// # Errors
    /// - Returns [`SpecializeErrorKind::UnsupportedArity`] if `key` has more than [`MAX_GENERIC_ARITY`] arguments
    /// - Returns [`SpecializeErrorKind::NoMatchingRegistration`] if `key` isn't generic or its shape isn't registered
    /// - Returns [`SpecializeErrorKind::NoConstructor`] or [`SpecializeErrorKind::AmbiguousConstructor`]
    ///   if the widest constructor of the instantiation can't be selected
    pub fn specialize(&self, key: &ServiceKey) -> Result<(), SpecializeErrorKind> {
        self.specialized(key).map(|_| ())
    }

    pub(crate) fn specialized(&self, key: &ServiceKey) -> Result<Registration, SpecializeErrorKind> {
        if let Some(registration) = self.get(key) {
            return Ok(registration);
        }

        let ServiceKey::Generic { shape, arguments } = key else {
            return Err(SpecializeErrorKind::NoMatchingRegistration { key: key.clone() });
        };
        if arguments.len() > MAX_GENERIC_ARITY {
            return Err(SpecializeErrorKind::UnsupportedArity {
                arity: arguments.len(),
                max: MAX_GENERIC_ARITY,
            });
        }
        let implementation = match self.open_generics.read().get(shape) {
            Some(implementation) if arguments.len() == shape.arity => implementation.clone(),
            _ => return Err(SpecializeErrorKind::NoMatchingRegistration { key: key.clone() }),
        };

        let constructor = implementation.close(key, arguments)?;
        let registration = constructor.into_registration(implementation.transient, &self.plans);

        let _stripe = self.locks.get(key).lock();
        let registration = self.registrations.write().entry(key.clone()).or_insert(registration).clone();
        debug!(implementation = registration.implementation.name, "Specialized");

        Ok(registration)
    }

    #[inline]
    pub(crate) fn get(&self, key: &ServiceKey) -> Option<Registration> {
        self.registrations.read().get(key).cloned()
    }

    /// Delivers disposal failures to every subscriber
    pub(crate) fn report(&self, errors: &DisposeErrors) {
        let handlers = self.dispose_error_handlers.read().clone();
        for handler in handlers {
            handler(errors);
        }
    }

    /// Dependencies a closed generic `key` would have once specialized, without registering it.
    /// `None` if it can't be specialized.
    fn derived_dependencies(&self, key: &ServiceKey) -> Option<Arc<[ServiceKey]>> {
        let ServiceKey::Generic { shape, arguments } = key else {
            return None;
        };
        let implementation = match self.open_generics.read().get(shape) {
            Some(implementation) if arguments.len() == shape.arity => implementation.clone(),
            _ => return None,
        };

        let constructor = implementation.close(key, arguments).ok()?;
        Some(constructor.dependencies(&self.plans).into())
    }

    fn dependencies<I, Deps>(&self) -> Arc<[ServiceKey]>
    where
        I: Injectable,
        Deps: DependencyResolver,
    {
        let mut keys = Vec::new();
        Deps::keys(&mut keys);
        keys.extend(self.plans.plan_for::<I>().keys().cloned());
        keys.into()
    }

    fn register(&self, key: ServiceKey, registration: Registration, check_cycles: bool) -> Result<(), RegisterErrorKind> {
        let span = info_span!(
            "register",
            service = %key,
            implementation = registration.implementation.name,
            lifetime = ?registration.provider.lifetime()
        );
        let _guard = span.enter();

        let _stripe = self.locks.get(&key).lock();
        if self.registrations.read().contains_key(&key) {
            let err = RegisterErrorKind::AlreadyRegistered { key };
            error!("{}", err);
            return Err(err);
        }

        if check_cycles {
            let registrations = self.registrations.read();
            let dependencies_of = |service: &ServiceKey| {
                registrations
                    .get(service)
                    .map(|registration| registration.dependencies.clone())
                    .or_else(|| self.derived_dependencies(service))
            };
            if let Some(chain) = find_cycle(&dependencies_of, registration.implementation, &key, &registration.dependencies) {
                let err = RegisterErrorKind::CircularTransient {
                    implementation: registration.implementation,
                    key,
                    chain: chain.into(),
                };
                error!("{}", err);
                return Err(err);
            }
            debug!("No cycles found");
        }

        self.registrations.write().insert(key, registration);
        debug!("Registered");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{format, string::{String, ToString}, sync::Arc, vec, vec::Vec};
    use core::marker::PhantomData;
    use std::thread;
    use tracing_test::traced_test;

    use super::{Lifetime, Registry};
    use crate::{
        errors::{RegisterErrorKind, SpecializeErrorKind},
        generic::{GenericConstructor, GenericImplementation},
        inject::Inject,
        injection::{Injectable, InjectionPoint},
        key::{GenericContract, GenericShape, ServiceKey},
    };

    struct Config(u8);

    impl Injectable for Config {}

    struct Node;

    impl Injectable for Node {
        fn injection_points() -> Vec<InjectionPoint<Self>> {
            vec![InjectionPoint::new(|_: &Self, _: Arc<Node>| {})]
        }
    }

    struct Left;

    impl Injectable for Left {}

    struct Right;

    impl Injectable for Right {}

    trait Repo<T>: Send + Sync {}

    impl<T: Send + Sync + 'static> GenericContract for dyn Repo<T> {
        const SHAPE: GenericShape = GenericShape::new("Repo", 1);
        type Arguments = (T,);
    }

    struct MemoryRepo<T>(PhantomData<fn() -> T>);

    impl<T: 'static> Injectable for MemoryRepo<T> {}

    impl<T: Send + Sync + 'static> Repo<T> for MemoryRepo<T> {}

    upcast!(MemoryRepo<u8> => dyn Repo<u8>);

    fn memory_repo() -> GenericImplementation {
        GenericImplementation::scoped("MemoryRepo", [0], |arguments| {
            if arguments.is::<(u8,)>() {
                vec![GenericConstructor::new::<dyn Repo<u8>, MemoryRepo<u8>, _>(Vec::<ServiceKey>::new(), |_| {
                    Ok(MemoryRepo(PhantomData))
                })]
            } else {
                Vec::new()
            }
        })
    }

    #[test]
    #[traced_test]
    fn test_duplicate_keeps_first() {
        let registry = Registry::new();
        registry.register_singleton(Arc::new(Config(1))).unwrap();

        let err = registry.register_singleton(Arc::new(Config(2))).unwrap_err();
        assert!(matches!(err, RegisterErrorKind::AlreadyRegistered { .. }));
        let err = registry.register_scoped::<Config, _, _, _>(|| Ok(Config(3))).unwrap_err();
        assert!(matches!(err, RegisterErrorKind::AlreadyRegistered { .. }));
        assert!(logs_contain("is already registered"));

        assert_eq!(registry.lifetime(&ServiceKey::of::<Config>()), Some(Lifetime::Singleton));
        assert_eq!(registry.scope().resolve::<Config>().unwrap().0, 1);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let registry = Registry::new();

        let winners = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|val| {
                    let registry = &registry;
                    scope.spawn(move || registry.register_singleton(Arc::new(Config(val))).is_ok())
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().is_ok_and(|ok| ok)).filter(|ok| *ok).count()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    #[traced_test]
    fn test_rejected_cycle_not_committed() {
        let registry = Registry::new();

        let err = registry.register_transient::<Node, _, _, _>(|| Ok(Node), true).unwrap_err();
        let RegisterErrorKind::CircularTransient { key, chain, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*key, ServiceKey::of::<Node>());
        assert_eq!(chain.len(), 2);
        assert!(format!("{err}").contains("cannot have transient lifetime"));
        assert!(!registry.contains(&ServiceKey::of::<Node>()));

        registry.register_scoped::<Node, _, _, _>(|| Ok(Node)).unwrap();
        assert_eq!(registry.lifetime(&ServiceKey::of::<Node>()), Some(Lifetime::Scoped));
    }

    #[test]
    fn test_constructor_cycle_detected() {
        let registry = Registry::new();
        registry
            .register_transient::<Right, _, _, _>(|Inject(_): Inject<Left>| Ok(Right), false)
            .unwrap();

        let err = registry
            .register_transient::<Left, _, _, _>(|Inject(_): Inject<Right>| Ok(Left), true)
            .unwrap_err();
        assert!(matches!(err, RegisterErrorKind::CircularTransient { .. }));

        registry.register_transient::<Left, _, _, _>(|| Ok(Left), true).unwrap();
    }

    #[test]
    fn test_clear() {
        let registry = Registry::new();
        let key = ServiceKey::of::<Config>();
        registry.register_singleton(Arc::new(Config(1))).unwrap();

        assert!(registry.clear(&key));
        assert!(!registry.clear(&key));
        assert!(!registry.contains(&key));
        registry.register_singleton(Arc::new(Config(2))).unwrap();
        assert!(registry.contains(&key));
    }

    #[test]
    #[traced_test]
    fn test_open_generic_registration() {
        let registry = Registry::new();
        let shape = <dyn Repo<u8>>::SHAPE;

        registry.register_open_generic(shape, memory_repo()).unwrap();
        assert!(matches!(
            registry.register_open_generic(shape, memory_repo()),
            Err(RegisterErrorKind::GenericAlreadyRegistered { .. })
        ));
        assert!(matches!(
            registry.register_open_generic(GenericShape::new("Plain", 0), memory_repo()),
            Err(RegisterErrorKind::InvalidGenericRegistration { .. })
        ));

        assert!(registry.clear_open_generic(&shape));
        registry.register_open_generic(shape, memory_repo()).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_specialize() {
        let registry = Registry::new();
        registry.register_open_generic(<dyn Repo<u8>>::SHAPE, memory_repo()).unwrap();

        let key = <dyn Repo<u8>>::key();
        registry.specialize(&key).unwrap();
        assert_eq!(registry.lifetime(&key), Some(Lifetime::Scoped));
        assert!(logs_contain("Specialized"));

        assert!(matches!(
            registry.specialize(&<dyn Repo<u16>>::key()),
            Err(SpecializeErrorKind::NoConstructor { .. })
        ));
        assert!(matches!(
            registry.specialize(&ServiceKey::of::<u8>()),
            Err(SpecializeErrorKind::NoMatchingRegistration { .. })
        ));
        assert!(matches!(
            registry.specialize(&ServiceKey::generic(
                GenericShape::new("Repo", 2),
                [ServiceKey::of::<u8>(), ServiceKey::of::<u8>()]
            )),
            Err(SpecializeErrorKind::NoMatchingRegistration { .. })
        ));

        let wide = ServiceKey::generic(GenericShape::new("Wide", 9), vec![ServiceKey::of::<u8>(); 9]);
        assert!(matches!(
            registry.specialize(&wide),
            Err(SpecializeErrorKind::UnsupportedArity { arity: 9, max: 8 })
        ));
    }
}
