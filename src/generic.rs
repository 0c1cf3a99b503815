use alloc::{boxed::Box, format, sync::Arc, vec::Vec};
use tracing::debug;

use crate::{
    any::TypeInfo,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, RegisterErrorKind, ResolveErrorKind, SpecializeErrorKind},
    injection::{plan_keys, Injectable, PlanCache},
    instance::{Instance, Upcast},
    instantiator::{Activation, BoxedCloneInstantiator},
    key::{GenericContract, GenericShape, ServiceKey, TypeArguments, MAX_GENERIC_ARITY},
    registry::{Provider, Registration},
    scope::Scope,
    service::{service_fn, BoxCloneService},
};

type Close = Arc<dyn Fn(TypeArguments<'_>) -> Vec<GenericConstructor> + Send + Sync>;
type Build = Arc<dyn Fn(ConstructorArguments<'_>, &PlanCache) -> Result<Activation, InstantiateErrorKind> + Send + Sync>;

/// Open generic implementation of a generic contract.
///
/// Rust can't instantiate a generic type from runtime type arguments, so `close` is the dispatch table:
/// for the type arguments of one instantiation it returns the constructors of the closed implementation,
/// or nothing if the instantiation isn't supported.
///
/// `arguments[i]` is the index of the contract argument that becomes the implementation's `i`-th parameter.
/// For `impl<T0, T1> Pair<T1, T0> for PairImpl<T0, T1>` it's `[1, 0]`,
/// for `impl<T> Pair<T, Fixed> for Single<T>` it's `[0]`.
pub struct GenericImplementation {
    pub(crate) name: &'static str,
    pub(crate) transient: bool,
    pub(crate) arguments: Box<[usize]>,
    close: Close,
}

impl GenericImplementation {
    /// Closed instantiations are cached per scope
    #[inline]
    #[must_use]
    pub fn scoped(
        name: &'static str,
        arguments: impl Into<Box<[usize]>>,
        close: impl Fn(TypeArguments<'_>) -> Vec<GenericConstructor> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, false, arguments.into(), Arc::new(close))
    }

    /// Closed instantiations are created per resolution
    #[inline]
    #[must_use]
    pub fn transient(
        name: &'static str,
        arguments: impl Into<Box<[usize]>>,
        close: impl Fn(TypeArguments<'_>) -> Vec<GenericConstructor> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, true, arguments.into(), Arc::new(close))
    }

    const fn new(name: &'static str, transient: bool, arguments: Box<[usize]>, close: Close) -> Self {
        Self {
            name,
            transient,
            arguments,
            close,
        }
    }

    /// Checks the argument map against the contract shape
    pub(crate) fn validate(&self, shape: GenericShape) -> Result<(), RegisterErrorKind> {
        let invalid = |reason| RegisterErrorKind::InvalidGenericRegistration { shape, reason };

        if shape.arity == 0 {
            return Err(invalid(format!("{} isn't a generic contract", shape.name)));
        }
        if shape.arity > MAX_GENERIC_ARITY {
            return Err(RegisterErrorKind::UnsupportedArity {
                arity: shape.arity,
                max: MAX_GENERIC_ARITY,
            });
        }
        if self.arguments.is_empty() {
            return Err(invalid(format!("{} isn't generic", self.name)));
        }
        if self.arguments.len() > shape.arity {
            return Err(invalid(format!(
                "{} has {} parameters, but the contract only has {}",
                self.name,
                self.arguments.len(),
                shape.arity
            )));
        }
        for (position, &index) in self.arguments.iter().enumerate() {
            if index >= shape.arity {
                return Err(invalid(format!("parameter {position} of {} maps to missing argument {index}", self.name)));
            }
            if self.arguments[..position].contains(&index) {
                return Err(invalid(format!("argument {index} is mapped to {} more than once", self.name)));
            }
        }
        Ok(())
    }

    /// Maps the arguments of a closed contract key onto the implementation's parameters
    /// and selects the widest constructor of that instantiation.
    ///
    /// Fails with [`SpecializeErrorKind::NoMatchingRegistration`] if the instantiation provides another closed contract,
    /// e.g. `Lookup<u8, V>` requested from `impl<V> Lookup<String, V> for NameLookup<V>`.
    pub(crate) fn close(&self, key: &ServiceKey, arguments: &[ServiceKey]) -> Result<GenericConstructor, SpecializeErrorKind> {
        let mapped: Vec<ServiceKey> = self.arguments.iter().map(|&index| arguments[index].clone()).collect();

        let constructors = (self.close)(TypeArguments(&mapped));
        let offered = !constructors.is_empty();

        let mut widest: Option<GenericConstructor> = None;
        let mut tied = false;
        // Arguments outside the map are fixed by the implementation, only constructors of `key` itself fit
        for constructor in constructors.into_iter().filter(|constructor| constructor.contract == *key) {
            let width = widest.as_ref().map(|current| current.parameters.len());
            match width {
                Some(width) if width > constructor.parameters.len() => {}
                Some(width) if width == constructor.parameters.len() => tied = true,
                _ => {
                    widest = Some(constructor);
                    tied = false;
                }
            }
        }

        match widest {
            None if offered => Err(SpecializeErrorKind::NoMatchingRegistration { key: key.clone() }),
            None => Err(SpecializeErrorKind::NoConstructor {
                implementation: self.name,
                key: key.clone(),
            }),
            Some(constructor) if tied => Err(SpecializeErrorKind::AmbiguousConstructor {
                implementation: self.name,
                key: key.clone(),
                parameters: constructor.parameters.len(),
            }),
            Some(constructor) => {
                debug!(
                    implementation = constructor.implementation.name,
                    parameters = constructor.parameters.len(),
                    "Constructor selected"
                );
                Ok(constructor)
            }
        }
    }
}

/// Constructor of one closed instantiation of a generic implementation.
///
/// # Examples
/// ```rust
/// use std::{marker::PhantomData, sync::Arc};
/// use scopedi::{GenericConstructor, GenericContract, GenericShape, Injectable, ServiceKey, Upcast};
///
/// struct Logger;
///
/// trait Repo<T>: Send + Sync {}
///
/// impl<T: Send + Sync + 'static> GenericContract for dyn Repo<T> {
///     const SHAPE: GenericShape = GenericShape::new("Repo", 1);
///     type Arguments = (T,);
/// }
///
/// struct MemoryRepo<T> {
///     logger: Arc<Logger>,
///     _entity: PhantomData<fn() -> T>,
/// }
///
/// impl<T: 'static> Injectable for MemoryRepo<T> {}
///
/// impl<T: 'static> Repo<T> for MemoryRepo<T> {}
///
/// impl<T: 'static> Upcast<dyn Repo<T>> for MemoryRepo<T> {
///     fn upcast(self: Arc<Self>) -> Arc<dyn Repo<T>> {
///         self
///     }
/// }
///
/// let constructor = GenericConstructor::new::<dyn Repo<u8>, MemoryRepo<u8>, _>([ServiceKey::of::<Logger>()], |arguments| {
///     Ok(MemoryRepo {
///         logger: arguments.get::<Logger>(0)?,
///         _entity: PhantomData,
///     })
/// });
/// assert_eq!(constructor.parameters(), [ServiceKey::of::<Logger>()]);
/// ```
pub struct GenericConstructor {
    implementation: TypeInfo,
    /// Closed contract key the instantiation provides
    contract: ServiceKey,
    parameters: Box<[ServiceKey]>,
    plan_keys: fn(&PlanCache) -> Vec<ServiceKey>,
    build: Build,
}

impl GenericConstructor {
    /// `build` receives the instances resolved for `parameters`, in the same order
    #[must_use]
    pub fn new<C, I, F>(parameters: impl Into<Box<[ServiceKey]>>, build: F) -> Self
    where
        C: GenericContract + ?Sized,
        I: Injectable + Upcast<C>,
        F: Fn(ConstructorArguments<'_>) -> Result<I, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            implementation: TypeInfo::of::<I>(),
            contract: C::key(),
            parameters: parameters.into(),
            plan_keys: plan_keys::<I>,
            build: Arc::new(move |arguments: ConstructorArguments<'_>, plans: &PlanCache| {
                build(arguments).map(|value| Activation::new::<C, I>(value, plans))
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[ServiceKey] {
        &self.parameters
    }

    /// Constructor parameters followed by the keys of the implementation's injection plan
    pub(crate) fn dependencies(&self, plans: &PlanCache) -> Vec<ServiceKey> {
        let mut dependencies = self.parameters.to_vec();
        dependencies.extend((self.plan_keys)(plans));
        dependencies
    }

    /// Registration of the closed instantiation, resolving each parameter from the requesting scope
    pub(crate) fn into_registration(self, transient: bool, plans: &PlanCache) -> Registration {
        let dependencies = self.dependencies(plans);

        let Self {
            implementation,
            parameters,
            build,
            ..
        } = self;
        let instantiator: BoxedCloneInstantiator = BoxCloneService::new(service_fn(move |scope: Scope| {
            let mut values = Vec::with_capacity(parameters.len());
            for key in &*parameters {
                match scope.resolve_key(key) {
                    Ok(value) => values.push(value),
                    Err(err) => return Err(InstantiatorErrorKind::Deps(err)),
                }
            }

            let arguments = ConstructorArguments {
                implementation,
                values: &values,
            };
            match build(arguments, scope.registry().plans()) {
                Ok(activation) => {
                    debug!("Instantiated");
                    Ok(activation)
                }
                Err(err) => Err(InstantiatorErrorKind::Factory(err)),
            }
        }));

        Registration {
            implementation,
            dependencies: dependencies.into(),
            provider: if transient {
                Provider::Transient(instantiator)
            } else {
                Provider::Scoped(instantiator)
            },
        }
    }
}

/// Resolved constructor parameters of a closed generic implementation
#[derive(Clone, Copy)]
pub struct ConstructorArguments<'a> {
    implementation: TypeInfo,
    values: &'a [Instance],
}

impl ConstructorArguments<'_> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `index`-th parameter as the contract `C`
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::Resolve`] wrapping [`ResolveErrorKind::IncorrectType`]
    ///   if the parameter wasn't created as `C`
    /// - Returns [`InstantiateErrorKind::Custom`] if the constructor declared fewer parameters
    pub fn get<C>(&self, index: usize) -> Result<Arc<C>, InstantiateErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let Some(value) = self.values.get(index) else {
            return Err(InstantiateErrorKind::Custom(anyhow::anyhow!(
                "Constructor of {} has no parameter {index}",
                self.implementation
            )));
        };
        value.downcast::<C>().ok_or_else(|| {
            ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<C>(),
                actual: value.type_info(),
            }
            .into()
        })
    }
}
