use alloc::boxed::Box;

use super::{instantiator::InstantiateErrorKind, instantiator::InstantiatorErrorKind, specialize::SpecializeErrorKind};
use crate::{any::TypeInfo, key::ServiceKey};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service {key} has no registration")]
    UnregisteredService { key: ServiceKey },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Specialize(SpecializeErrorKind),
    #[error("Scope is already disposed")]
    ScopeDisposed,
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}
