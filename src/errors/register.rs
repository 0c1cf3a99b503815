use alloc::{boxed::Box, string::String};
use core::fmt::{self, Display, Formatter};

use crate::{
    any::TypeInfo,
    key::{GenericShape, ServiceKey},
};

#[derive(thiserror::Error, Debug)]
pub enum RegisterErrorKind {
    #[error("Service {key} is already registered")]
    AlreadyRegistered { key: ServiceKey },
    #[error("Open generic service {shape} is already registered")]
    GenericAlreadyRegistered { shape: GenericShape },
    #[error(
        "Type {implementation} has a circular dependency on {key} and so cannot have transient lifetime: {}",
        Chain(.chain)
    )]
    CircularTransient {
        implementation: TypeInfo,
        key: ServiceKey,
        chain: Box<[ServiceKey]>,
    },
    #[error("Invalid open generic registration of {shape}: {reason}")]
    InvalidGenericRegistration { shape: GenericShape, reason: String },
    #[error("Generic arity {arity} isn't supported, max is {max}")]
    UnsupportedArity { arity: usize, max: usize },
}

struct Chain<'a>(&'a [ServiceKey]);

impl Display for Chain<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, key) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
