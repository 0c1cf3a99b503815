use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::any::{Any, TypeId};
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    any::TypeInfo,
    dispose::Dispose,
    errors::ResolveErrorKind,
    instance::Instance,
    key::{GenericContract, ServiceKey},
    scope::Scope,
};

/// Describes how an implementation type is wired after construction.
///
/// This is the only thing the container knows about an implementation besides its factory,
/// so any way of enumerating injectable members (hand-written, generated by a macro, etc.) works
/// as long as the order of [`Injectable::injection_points`] is stable.
///
/// # Examples
/// ```rust
/// use std::sync::{Arc, OnceLock};
/// use scopedi::{Injectable, InjectionPoint};
///
/// struct Config;
///
/// impl Injectable for Config {}
///
/// #[derive(Default)]
/// struct Service {
///     config: OnceLock<Arc<Config>>,
/// }
///
/// impl Injectable for Service {
///     fn injection_points() -> Vec<InjectionPoint<Self>> {
///         vec![InjectionPoint::new(|service: &Self, config: Arc<Config>| {
///             let _ = service.config.set(config);
///         })]
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Injectable members in the order they're set
    #[must_use]
    fn injection_points() -> Vec<InjectionPoint<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Returns `Some` if the instance must be disposed by the scope that created it
    #[inline]
    fn as_dispose(&self) -> Option<&dyn Dispose> {
        None
    }
}

type Setter<T> = Arc<dyn Fn(&T, Instance) -> Result<(), ResolveErrorKind> + Send + Sync>;

/// A member of `T` that requires an instance of a contract
pub struct InjectionPoint<T> {
    key: ServiceKey,
    setter: Setter<T>,
}

impl<T> Clone for InjectionPoint<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T: 'static> InjectionPoint<T> {
    #[inline]
    #[must_use]
    pub fn new<C>(setter: impl Fn(&T, Arc<C>) + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self::keyed(ServiceKey::of::<C>(), setter)
    }

    #[inline]
    #[must_use]
    pub fn generic<C>(setter: impl Fn(&T, Arc<C>) + Send + Sync + 'static) -> Self
    where
        C: GenericContract + ?Sized,
    {
        Self::keyed(C::key(), setter)
    }

    /// Requires the instance registered under `key`, which must have been created as `C`
    #[must_use]
    pub fn keyed<C>(key: ServiceKey, setter: impl Fn(&T, Arc<C>) + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            key,
            setter: Arc::new(move |target, instance| {
                let Some(value) = instance.downcast::<C>() else {
                    return Err(ResolveErrorKind::IncorrectType {
                        expected: TypeInfo::of::<C>(),
                        actual: instance.type_info(),
                    });
                };
                setter(target, value);
                Ok(())
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> &ServiceKey {
        &self.key
    }
}

/// Ordered injection steps of one implementation type, shared by all its instances
pub struct InjectionPlan<T> {
    points: Arc<[InjectionPoint<T>]>,
}

impl<T> Clone for InjectionPlan<T> {
    fn clone(&self) -> Self {
        Self {
            points: self.points.clone(),
        }
    }
}

impl<T: Injectable> InjectionPlan<T> {
    fn build() -> Self {
        Self {
            points: T::injection_points().into(),
        }
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.points.iter().map(InjectionPoint::key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Resolves every required contract from `scope` and passes it to its setter, in order.
    /// Stops at the first failure, members set before it stay set.
    ///
    /// # Errors
    /// Returns the error of the first failed resolution or the [`ResolveErrorKind::IncorrectType`]
    /// if the resolved instance wasn't created as the contract the setter expects.
    pub fn apply(&self, target: &T, scope: &Scope) -> Result<(), ResolveErrorKind> {
        for point in self.points.iter() {
            let instance = scope.resolve_key(&point.key)?;
            (point.setter)(target, instance)?;
        }
        Ok(())
    }
}

/// Plans memoized per implementation type.
/// Concurrent first requests may both build a plan, the first published one is kept.
#[derive(Default)]
pub(crate) struct PlanCache {
    plans: RwLock<BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl PlanCache {
    #[allow(clippy::missing_panics_doc)]
    pub(crate) fn plan_for<T: Injectable>(&self) -> InjectionPlan<T> {
        let type_id = TypeId::of::<T>();

        if let Some(plan) = self.plans.read().get(&type_id) {
            return Self::downcast(plan);
        }

        let plan = InjectionPlan::<T>::build();
        debug!(implementation = TypeInfo::of::<T>().name, points = plan.len(), "Injection plan built");

        let mut guard = self.plans.write();
        let published = guard.entry(type_id).or_insert_with(|| Arc::new(plan));
        Self::downcast(published)
    }

    fn downcast<T: Injectable>(plan: &Arc<dyn Any + Send + Sync>) -> InjectionPlan<T> {
        plan.downcast_ref::<InjectionPlan<T>>()
            .expect("plan should be stored under the type id of its implementation")
            .clone()
    }
}

/// Keys required by the injection plan of `T`
pub(crate) fn plan_keys<T: Injectable>(plans: &PlanCache) -> Vec<ServiceKey> {
    plans.plan_for::<T>().keys().cloned().collect()
}
