use alloc::{boxed::Box, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    cache::{Cache, Closed},
    dispose::Owned,
    errors::{DisposeError, DisposeErrors, InstantiatorErrorKind, ResolveErrorKind, SpecializeErrorKind},
    instance::Instance,
    instantiator::Activation,
    key::{GenericContract, ServiceKey},
    registry::{Provider, Registration, Registry},
    service::Service as _,
};

/// A resolution session, e.g. one request or one unit of work.
///
/// Owns its scoped instances and every scoped or transient instance it created that must be disposed.
/// Handles are cheap to clone and share the same session.
///
/// # Disposal
/// [`Self::dispose`] is the primary way to end a scope.
/// If [`crate::Config::dispose_on_drop`] is set, dropping the last handle of a scope that wasn't disposed disposes it.
/// A scope held by one of its own instances is never dropped, so don't rely on it.
///
/// # Warning
/// One scope is one logical unit of work. Resolving from the same scope on several threads at once
/// doesn't corrupt it, but a scoped service may be constructed more than once, only the first one is kept.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    #[inline]
    #[must_use]
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                registry,
                cache: Mutex::new(Cache::default()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Resolves the contract `C`
    #[allow(clippy::missing_errors_doc)]
    #[inline]
    pub fn resolve<C>(&self) -> Result<Arc<C>, ResolveErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with_key(&ServiceKey::of::<C>())
    }

    /// Resolves the closed generic contract `C`, specializing its open generic registration if needed
    #[allow(clippy::missing_errors_doc)]
    #[inline]
    pub fn resolve_generic<C>(&self) -> Result<Arc<C>, ResolveErrorKind>
    where
        C: GenericContract + ?Sized,
    {
        self.resolve_with_key(&C::key())
    }

    /// Resolves `key` and downcasts the instance to the contract `C`
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the instance of `key` wasn't created as `C`
    pub fn resolve_with_key<C>(&self, key: &ServiceKey) -> Result<Arc<C>, ResolveErrorKind>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let instance = self.resolve_key(key)?;
        instance.downcast::<C>().ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<C>(),
                actual: instance.type_info(),
            };
            error!("{}", err);
            err
        })
    }

    /// Resolves the instance of `key`.
    ///
    /// Scoped instances are cached before their injection plan runs, and evicted if it fails.
    /// Singletons are returned as registered and never owned by the scope.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::ScopeDisposed`] if the scope is disposed
    /// - Returns [`ResolveErrorKind::UnregisteredService`] if `key` has no registration
    ///   and can't be specialized from an open generic one
    /// - Returns [`ResolveErrorKind::Specialize`] if the specialization of a matching open generic registration failed
    /// - Returns [`ResolveErrorKind::Instantiator`] if a dependency or the factory failed
    pub fn resolve_key(&self, key: &ServiceKey) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("resolve", service = %key);
        let _guard = span.enter();

        {
            let cache = self.inner.cache.lock();
            if cache.is_disposed() {
                let err = ResolveErrorKind::ScopeDisposed;
                error!("{}", err);
                return Err(err);
            }
            if let Some(instance) = cache.get(key) {
                debug!("Found in cache");
                return Ok(instance);
            }
        }
        debug!("Not found in cache");

        let Registration { provider, .. } = self.registration(key)?;
        let (mut instantiator, scoped) = match provider {
            Provider::Singleton(instance) => {
                debug!("Singleton returned");
                return Ok(instance);
            }
            Provider::Scoped(instantiator) => (instantiator, true),
            Provider::Transient(instantiator) => (instantiator, false),
        };

        let Activation {
            instance,
            owned,
            initialize,
        } = match instantiator.call(self.clone()) {
            Ok(activation) => activation,
            Err(err) => {
                let err = ResolveErrorKind::Instantiator(match err {
                    InstantiatorErrorKind::Deps(err) => InstantiatorErrorKind::Deps(Box::new(err)),
                    InstantiatorErrorKind::Factory(err) => InstantiatorErrorKind::Factory(err),
                });
                error!("{}", err);
                return Err(err);
            }
        };

        if scoped {
            let mut cache = self.inner.cache.lock();
            if cache.is_disposed() {
                drop(cache);
                self.inner.dispose_owned(owned);
                let err = ResolveErrorKind::ScopeDisposed;
                error!("{}", err);
                return Err(err);
            }
            // The factory resolved the same key through a cycle
            if let Some(cached) = cache.get(key) {
                drop(cache);
                debug!("Cached while instantiating, new instance discarded");
                self.inner.dispose_owned(owned);
                return Ok(cached);
            }
            cache.insert(key.clone(), instance.clone());
            debug!("Cached before initialization");
        }

        let initialized = initialize(self);
        if let Some(owned) = owned {
            self.own(owned);
        }
        if let Err(err) = initialized {
            if scoped {
                self.inner.cache.lock().remove(key);
                debug!("Evicted after failed initialization");
            }
            error!("{}", err);
            return Err(err);
        }

        debug!("Resolved");
        Ok(instance)
    }

    /// Disposes every owned instance in creation order and closes the scope.
    /// Later calls do nothing, later resolutions fail with [`ResolveErrorKind::ScopeDisposed`].
    ///
    /// Failures don't stop the rest from disposing,
    /// they're delivered to [`Registry::on_dispose_error`] subscribers as one [`DisposeErrors`].
    pub fn dispose(&self) {
        let span = info_span!("dispose");
        let _guard = span.enter();

        if self.inner.close() {
            debug!("Scope disposed");
        } else {
            debug!("Scope already disposed");
        }
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.cache.lock().is_disposed()
    }

    #[inline]
    #[must_use]
    pub(crate) fn same_scope(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn registration(&self, key: &ServiceKey) -> Result<Registration, ResolveErrorKind> {
        if let Some(registration) = self.inner.registry.get(key) {
            return Ok(registration);
        }

        let err = if key.is_generic() {
            match self.inner.registry.specialized(key) {
                Ok(registration) => return Ok(registration),
                Err(SpecializeErrorKind::NoMatchingRegistration { key }) => ResolveErrorKind::UnregisteredService { key },
                Err(err) => ResolveErrorKind::Specialize(err),
            }
        } else {
            ResolveErrorKind::UnregisteredService { key: key.clone() }
        };
        error!("{}", err);
        Err(err)
    }

    fn own(&self, owned: Owned) {
        let rejected = self.inner.cache.lock().push_owned(owned);
        if rejected.is_some() {
            debug!("Scope disposed while resolving, disposing immediately");
            self.inner.dispose_owned(rejected);
        }
    }
}

struct ScopeInner {
    registry: Arc<Registry>,
    cache: Mutex<Cache>,
}

impl ScopeInner {
    /// Returns `false` if the scope was already closed
    fn close(&self) -> bool {
        let Some(Closed { map, owned }) = self.cache.lock().close() else {
            return false;
        };
        drop(map);
        self.dispose_owned(owned);
        true
    }

    fn dispose_owned(&self, owned: impl IntoIterator<Item = Owned>) {
        let errors: Vec<DisposeError> = owned
            .into_iter()
            .filter_map(|owned| {
                let service = owned.type_info;
                match owned.dispose() {
                    Ok(()) => {
                        debug!(service = service.name, "Disposed");
                        None
                    }
                    Err(source) => {
                        let err = DisposeError { service, source };
                        error!("{}", err);
                        Some(err)
                    }
                }
            })
            .collect();

        if !errors.is_empty() {
            self.registry.report(&DisposeErrors { errors });
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if self.registry.config().dispose_on_drop && self.close() {
            debug!("Scope disposed on drop");
        }
    }
}
