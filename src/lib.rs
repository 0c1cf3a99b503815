#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod cycle;
pub(crate) mod dependency_resolver;
pub(crate) mod dispose;
pub(crate) mod errors;
pub(crate) mod generic;
pub(crate) mod inject;
pub(crate) mod injection;
pub(crate) mod instance;
pub(crate) mod instantiator;
pub(crate) mod key;
pub(crate) mod lock;
pub(crate) mod registry;
pub(crate) mod scope;
pub(crate) mod service;

pub use any::TypeInfo;
pub use config::Config;
pub use dependency_resolver::DependencyResolver;
pub use dispose::Dispose;
pub use errors::{
    DisposeError, DisposeErrors, InstantiateErrorKind, InstantiatorErrorKind, RegisterErrorKind, ResolveErrorKind,
    SpecializeErrorKind,
};
pub use generic::{ConstructorArguments, GenericConstructor, GenericImplementation};
pub use inject::{Inject, InjectGeneric};
pub use injection::{Injectable, InjectionPlan, InjectionPoint};
pub use instance::{Instance, Upcast};
pub use instantiator::Instantiator;
pub use key::{GenericContract, GenericShape, ServiceKey, TypeArguments, TypeList, MAX_GENERIC_ARITY};
pub use registry::{Lifetime, Registry};
pub use scope::Scope;

#[doc(hidden)]
pub mod __private {
    pub use alloc::sync::Arc;
}
